//! Traversal driver and emitter over hand-built translation units.

use std::path::Path;
use std::sync::LazyLock;

use bnd_ctypes::config::FunctionFilter;
use bnd_ctypes::emit::{EmitOptions, emit_module};
use bnd_ctypes::generate::Generator;
use bnd_ctypes::model::*;
use bnd_ctypes::registry::TypeContext;
use bnd_ctypes::resolve::{BindingType, Primitive};

const UNIT: &str = "/project/include/unit.h";
const SOURCE: &str = "/project/source.c";

struct UnitBuilder {
    path: &'static str,
    line: u32,
    declarations: Vec<Declaration>,
}

impl UnitBuilder {
    fn new(path: &'static str) -> Self {
        Self {
            path,
            line: 0,
            declarations: Vec::new(),
        }
    }

    fn next_id(&mut self) -> DeclId {
        self.line += 1;
        DeclId::new(self.path, self.line, 1)
    }

    fn typedef(mut self, name: &str, underlying: &str) -> Self {
        let id = self.next_id();
        self.declarations.push(Declaration::Typedef(TypedefDecl {
            id,
            name: name.to_string(),
            underlying: underlying.to_string(),
        }));
        self
    }

    fn macro_def(mut self, tokens: &[&str]) -> Self {
        let id = self.next_id();
        self.declarations.push(Declaration::Macro(MacroDecl {
            id,
            name: tokens[0].to_string(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            function_like: false,
        }));
        self
    }

    fn enumeration(mut self, spelling: &str, constants: &[(&str, i64)]) -> Self {
        let id = self.next_id();
        self.declarations.push(Declaration::Enum(EnumDecl {
            id,
            spelling: spelling.to_string(),
            members: constants
                .iter()
                .map(|(name, value)| EnumMember::Constant {
                    name: name.to_string(),
                    value: *value,
                })
                .collect(),
        }));
        self
    }

    fn record(mut self, spelling: &str, fields: &[(&str, &str)]) -> Self {
        let id = self.next_id();
        self.declarations.push(Declaration::Record(RecordDecl {
            id,
            spelling: spelling.to_string(),
            is_union: spelling.starts_with("union "),
            anonymous: false,
            members: fields
                .iter()
                .map(|(name, spelling)| {
                    RecordMember::Field(FieldDecl {
                        name: name.to_string(),
                        spelling: spelling.to_string(),
                        canonical: spelling.to_string(),
                        bitfield_width: None,
                        anonymous_type: false,
                    })
                })
                .collect(),
        }));
        self
    }

    fn anonymous_record(self, spelling: &str, fields: &[(&str, &str)]) -> Self {
        let mut builder = self.record(spelling, fields);
        if let Some(Declaration::Record(r)) = builder.declarations.last_mut() {
            r.anonymous = true;
        }
        builder
    }

    fn function(mut self, name: &str, result: &str, arguments: &[&str]) -> Self {
        let id = self.next_id();
        self.declarations.push(Declaration::Function(FunctionDecl {
            id,
            name: name.to_string(),
            result: result.to_string(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
        }));
        self
    }

    /// A declaration pulled in from another file.
    fn foreign(mut self, unit: &TranslationUnit) -> Self {
        self.declarations.extend(unit.declarations.iter().cloned());
        self
    }

    fn build(self) -> TranslationUnit {
        TranslationUnit {
            path: self.path.into(),
            declarations: self.declarations,
        }
    }
}

fn run(units: &[TranslationUnit]) -> Bindings {
    Generator::run(TypeContext::new(), FunctionFilter::default(), units)
}

fn emit(bindings: &Bindings) -> String {
    emit_module(
        bindings,
        &EmitOptions {
            project: Path::new("/project"),
            library: "./libunit.so",
        },
    )
}

// ---------------------------------------------------------------------------
// End-to-end scenario
// ---------------------------------------------------------------------------

static SCENARIO: LazyLock<Bindings> = LazyLock::new(|| {
    let unit = UnitBuilder::new(UNIT)
        .typedef("u8", "uint8_t")
        .enumeration("enum Color", &[("RED", 0), ("GREEN", 1)])
        .typedef("ColorAlias", "enum Color")
        .record(
            "struct Point",
            &[("x", "int"), ("y", "int"), ("next", "struct Point *")],
        )
        .function("brightness", "u8", &["ColorAlias", "u8 *"])
        .build();
    run(&[unit])
});

static SCENARIO_TEXT: LazyLock<String> = LazyLock::new(|| emit(&SCENARIO));

#[test]
fn scenario_enum_uses_alias() {
    assert_eq!(SCENARIO.enums.len(), 1, "Found: {:?}", SCENARIO.enums);
    let color = SCENARIO
        .enumeration("ColorAlias")
        .unwrap_or_else(|| panic!("ColorAlias missing. Found: {:?}", SCENARIO.enums));
    assert_eq!(
        color.constants,
        vec![("RED".to_string(), 0), ("GREEN".to_string(), 1)]
    );
    assert!(SCENARIO.enumeration("Color").is_none());
    assert!(SCENARIO.enumeration("enum Color").is_none());
}

#[test]
fn scenario_point_is_self_referential() {
    assert_eq!(SCENARIO.aggregates.len(), 1);
    let point = SCENARIO
        .aggregate("struct_Point")
        .unwrap_or_else(|| panic!("struct_Point missing. Found: {:?}", SCENARIO.aggregates));
    let names: Vec<&str> = point.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["x", "y", "next"]);
    assert_eq!(point.fields[2].ty, BindingType::SelfPointer);
}

#[test]
fn scenario_u8_is_transparent() {
    assert!(SCENARIO.typedef("u8").is_none());
    let f = SCENARIO.function("brightness").expect("brightness bound");
    assert_eq!(f.return_type.to_string(), "c_uint8");
    let args: Vec<String> = f.arguments.iter().map(ToString::to_string).collect();
    assert_eq!(args, ["ColorAlias", "POINTER(c_uint8)"]);

    let text = &*SCENARIO_TEXT;
    assert!(!text.contains("u8 ="), "u8 line emitted:\n{text}");
}

#[test]
fn scenario_text() {
    let text = &*SCENARIO_TEXT;
    for expected in [
        "this = c_void_p",
        "ColorAlias = c_int\n",
        "# ColorAlias\nRED = c_int(0)\nGREEN = c_int(1)\n",
        "class struct_Point(Structure):\n    _fields_ = [\n        (\"x\", c_int32),\n        (\"y\", c_int32),\n        (\"next\", this),\n    ]\n",
        "self.brightness = lib.brightness\n",
        "self.brightness.restype = c_uint8\n",
        "self.brightness.argtypes = [ColorAlias, POINTER(c_uint8)]\n",
        "libpath = \"./libunit.so\"",
    ] {
        assert!(text.contains(expected), "missing {expected:?} in:\n{text}");
    }
    assert_eq!(text.matches("RED = ").count(), 1);
    assert!(text.contains("# +    include/unit.h "), "banner path is not relative:\n{text}");
}

// ---------------------------------------------------------------------------
// Driver behavior
// ---------------------------------------------------------------------------

#[test]
fn aliases_from_later_files_are_known_everywhere() {
    // the source file uses an alias only declared by the header handled later
    let source = UnitBuilder::new(SOURCE)
        .function("area", "PointHandle", &["PointHandle"])
        .build();
    let header = UnitBuilder::new(UNIT)
        .record("struct Point", &[("x", "int")])
        .typedef("PointHandle", "struct Point *")
        .build();

    let bindings = run(&[source, header]);
    let area = bindings.function("area").expect("area bound");
    assert_eq!(area.return_type.to_string(), "PointHandle");

    let handle = bindings.typedef("PointHandle").expect("PointHandle emitted");
    assert!(handle.deferred);
    assert_eq!(handle.rhs.to_string(), "POINTER(struct_Point)");
}

#[test]
fn only_own_file_declarations_are_handled() {
    let header = UnitBuilder::new(UNIT)
        .macro_def(&["FORTYTWO", "42"])
        .function("from_header", "void", &[])
        .build();
    let source = UnitBuilder::new(SOURCE)
        .foreign(&header)
        .function("from_source", "void", &[])
        .build();

    let bindings = run(std::slice::from_ref(&source));
    assert!(bindings.macro_def("FORTYTWO").is_none());
    assert!(bindings.function("from_header").is_none());
    assert!(bindings.function("from_source").is_some());
    assert_eq!(bindings.files, [Path::new(SOURCE)]);
}

#[test]
fn definition_replaces_forward_declaration() {
    let unit = UnitBuilder::new(UNIT)
        .record("struct S", &[])
        .function("make", "struct S *", &[])
        .record("struct S", &[("value", "int")])
        .function("use_it", "struct S *", &[])
        .build();

    let bindings = run(&[unit]);
    assert_eq!(bindings.aggregates.len(), 1);
    let s = bindings.aggregate("struct_S").expect("struct_S present");
    assert!(!s.incomplete);
    assert_eq!(s.fields.len(), 1);

    // resolved while S was still incomplete
    assert_eq!(bindings.function("make").unwrap().return_type, BindingType::opaque());
    assert_eq!(
        bindings.function("use_it").unwrap().return_type.to_string(),
        "POINTER(struct_S)"
    );
}

#[test]
fn typedef_named_enum_is_defined_before_use() {
    let unit = UnitBuilder::new(UNIT)
        .enumeration("Level_t", &[("LO", 0)])
        .typedef("Level_t", "Level_t")
        .function("get", "Level_t", &["Level_t"])
        .build();

    let bindings = run(&[unit]);
    let alias = bindings
        .typedef("Level_t")
        .unwrap_or_else(|| panic!("Level_t missing. Found: {:?}", bindings.typedefs));
    assert_eq!(alias.rhs, BindingType::Primitive(Primitive::Int));

    let text = emit(&bindings);
    assert_eq!(text.matches("Level_t = c_int\n").count(), 1, "in:\n{text}");
    assert!(text.contains("# Level_t\nLO = c_int(0)\n"), "in:\n{text}");
    let alias_at = text.find("Level_t = c_int").unwrap();
    let use_at = text
        .find("self.get.restype = Level_t")
        .unwrap_or_else(|| panic!("get restype missing in:\n{text}"));
    assert!(alias_at < use_at);
    assert!(text.contains("self.get.argtypes = [Level_t]\n"));
}

#[test]
fn anonymous_pointer_typedef_target_is_named() {
    let unit = UnitBuilder::new(UNIT)
        .anonymous_record(
            "struct (unnamed at /project/include/unit.h:1:9)",
            &[("value", "int")],
        )
        .typedef("Foo", "struct (unnamed at /project/include/unit.h:1:9) *")
        .function("make_foo", "Foo", &[])
        .build();

    let text = emit(&run(&[unit]));
    assert!(!text.contains("(unnamed"), "unnamed spelling leaked into:\n{text}");
    assert!(text.contains("class struct_anon_0(Structure):"), "in:\n{text}");
    let class_at = text.find("class struct_anon_0(").unwrap();
    let handle_at = text
        .find("Foo = POINTER(struct_anon_0)")
        .unwrap_or_else(|| panic!("Foo missing in:\n{text}"));
    assert!(class_at < handle_at);
    assert!(text.contains("self.make_foo.restype = Foo\n"));
}

#[test]
fn forward_declaration_after_definition_keeps_fields() {
    let unit = UnitBuilder::new(UNIT)
        .record("struct S", &[("value", "int")])
        .record("struct S", &[])
        .function("use_it", "struct S *", &[])
        .build();

    let bindings = run(&[unit]);
    let s = bindings.aggregate("struct_S").expect("struct_S present");
    assert!(!s.incomplete);
    assert_eq!(s.fields.len(), 1);
    assert_eq!(
        bindings.function("use_it").unwrap().return_type.to_string(),
        "POINTER(struct_S)"
    );
    let text = emit(&bindings);
    assert!(!text.contains("# incomplete type"), "in:\n{text}");
}

#[test]
fn incomplete_struct_is_annotated() {
    let unit = UnitBuilder::new(UNIT).record("struct Opaque", &[]).build();
    let text = emit(&run(&[unit]));
    assert!(
        text.contains("class struct_Opaque(Structure):  # incomplete type"),
        "missing incomplete note:\n{text}"
    );
}

#[test]
fn sections_follow_kind_order_per_file() {
    let header = UnitBuilder::new(UNIT)
        .record("struct Point", &[("x", "int")])
        .typedef("PointHandle", "struct Point *")
        .typedef("IntPtr", "int *")
        .macro_def(&["LIMIT", "(", "8", ")"])
        .enumeration("enum Mode", &[("FAST", 1)])
        .function("reset", "void", &[])
        .build();
    let source = UnitBuilder::new(SOURCE)
        .macro_def(&["GREETING", "\"hi\""])
        .function("greet", "const char *", &["PointHandle"])
        .build();

    let text = emit(&run(&[header, source]));
    let at = |needle: &str| {
        text.find(needle)
            .unwrap_or_else(|| panic!("missing {needle:?} in:\n{text}"))
    };

    assert!(at("IntPtr = POINTER(c_int32)") < at("LIMIT = c_int(8)"));
    assert!(at("LIMIT = c_int(8)") < at("# enum Mode"));
    assert!(at("# enum Mode") < at("class struct_Point(Structure)"));
    assert!(at("class struct_Point(Structure)") < at("PointHandle = POINTER(struct_Point)"));
    assert!(at("PointHandle = POINTER(struct_Point)") < at("# +    source.c"));
    assert!(at("# +    source.c") < at("GREETING = \"hi\""));
    assert!(at("GREETING = \"hi\"") < at("Functions class"));
    assert!(at("self.reset = lib.reset") < at("self.greet = lib.greet"));
    assert!(text.contains("self.greet.restype = c_char_p\n"));
    assert!(text.contains("self.greet.argtypes = [PointHandle]\n"));
    assert!(text.contains("self.reset.argtypes = []\n"));
}

#[test]
fn empty_sections_emit_nothing() {
    let unit = UnitBuilder::new(UNIT).function("reset", "void", &[]).build();
    let text = emit(&run(&[unit]));
    assert!(!text.contains("class struct_"));
    assert!(!text.contains(" = c_int("));
    let banner_end = text
        .find("include/unit.h")
        .expect("banner for unit.h");
    let banner_line_end = banner_end + text[banner_end..].find('\n').unwrap();
    // nothing between the file banner and its closing rule
    let after = &text[banner_line_end + 1..];
    assert!(
        after.starts_with("# +---"),
        "unexpected content after banner:\n{after}"
    );
}

#[test]
fn output_is_deterministic() {
    let build = || {
        let unit = UnitBuilder::new(UNIT)
            .enumeration("enum Color", &[("RED", 0)])
            .record("struct Point", &[("x", "int")])
            .build();
        emit(&run(&[unit]))
    };
    assert_eq!(build(), build());
}
