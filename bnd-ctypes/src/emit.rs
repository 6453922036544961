//! Emitter: binding records → Python `ctypes` module text.

use std::fmt::Write;
use std::path::Path;

use tracing::debug;

use crate::model::*;
use crate::resolve::SELF_POINTER;

/// Settings for the generated text.
#[derive(Debug, Clone)]
pub struct EmitOptions<'a> {
    /// Banner paths are shown relative to this directory.
    pub project: &'a Path,
    /// Library path the loader class falls back to.
    pub library: &'a str,
}

/// Render the whole module: per file typedefs, macros, enums, aggregates and
/// deferred typedefs, then one loader class with every function.
pub fn emit_module(bindings: &Bindings, options: &EmitOptions<'_>) -> String {
    let mut out = String::new();
    write_beginning(&mut out);

    for file in &bindings.files {
        write_banner(&mut out, &display_path(file, options.project));
        emit_file(&mut out, bindings, file);
    }

    write_functions(&mut out, bindings, options);
    out
}

fn emit_file(out: &mut String, bindings: &Bindings, file: &Path) {
    let (deferred, typedefs): (Vec<&TypedefRecord>, Vec<&TypedefRecord>) =
        in_file(&bindings.typedefs, file).partition(|t| t.deferred);

    section(out, typedefs.iter().copied(), emit_typedef);
    section(out, in_file(&bindings.macros, file), emit_macro);
    section(out, in_file(&bindings.enums, file), emit_enum);
    section(out, in_file(&bindings.aggregates, file), emit_aggregate);
    section(out, deferred.iter().copied(), emit_typedef);

    debug!(file = %file.display(), "emitted file section");
}

/// Emit a section, followed by a blank line, only if it has content.
fn section<'a, T: 'a>(
    out: &mut String,
    records: impl Iterator<Item = &'a T>,
    emit: fn(&mut String, &T),
) {
    let mut any = false;
    for record in records {
        emit(out, record);
        any = true;
    }
    if any {
        out.push('\n');
    }
}

fn emit_typedef(out: &mut String, t: &TypedefRecord) {
    let _ = writeln!(out, "{} = {}", t.name, t.rhs);
}

fn emit_macro(out: &mut String, m: &MacroRecord) {
    let _ = writeln!(out, "{} = {}", m.name, m.value);
}

fn emit_enum(out: &mut String, e: &EnumRecord) {
    let _ = writeln!(out, "\n# {}", e.name);
    for (name, value) in &e.constants {
        let _ = writeln!(out, "{name} = c_int({value})");
    }
}

fn emit_aggregate(out: &mut String, a: &AggregateRecord) {
    let kind = if a.is_union { "Union" } else { "Structure" };
    let note = if a.incomplete {
        "  # incomplete type, pointers to type replaced with 'c_void_p'"
    } else {
        ""
    };
    let _ = writeln!(out, "\n\nclass {}({kind}):{note}", a.name);
    if a.has_scope() {
        let _ = writeln!(out, "    _anonymous_ = (\"{SCOPE_FIELD}\",)");
    }
    out.push_str("    _fields_ = [");
    for field in &a.fields {
        let _ = write!(out, "\n        (\"{}\", {}", field.name, field.ty);
        if field.bit_width != 0 {
            let _ = write!(out, ", {}", field.bit_width);
        }
        out.push_str("),");
    }
    out.push_str("\n    ]\n");
}

// ---------------------------------------------------------------------------
// Module frame
// ---------------------------------------------------------------------------

fn write_beginning(out: &mut String) {
    out.push_str("#!/usr/bin/python3\n");
    out.push_str("import platform\n");
    out.push_str("from ctypes import *\n\n");
    let _ = writeln!(
        out,
        "{SELF_POINTER} = c_void_p  # pointer to the structure currently being defined\n"
    );
}

fn write_banner(out: &mut String, title: &str) {
    out.push_str("# +----------------------------------------------------------------------+\n");
    let _ = writeln!(out, "# +    {title:<65} +");
    out.push_str("# +----------------------------------------------------------------------+\n\n");
}

fn write_functions(out: &mut String, bindings: &Bindings, options: &EmitOptions<'_>) {
    out.push('\n');
    write_banner(out, "Functions class");
    let _ = write!(
        out,
        r#"class Class(object):
    _instance = None
    _initialized = False

    def __new__(cls, *args, **kwargs):
        if Class._instance is None:
            Class._instance = object.__new__(cls)
        return Class._instance

    def __init__(self, libpath=None):
        if Class._initialized:
            return
        if libpath is None:
            libpath = "{library}"
            if platform.system() == "Windows" and libpath.endswith(".so"):
                libpath = libpath[:-3] + ".dll"
        lib = cdll.LoadLibrary(libpath)

"#,
        library = options.library
    );

    let tab = "        ";
    for f in bindings.functions.iter().map(|l| &l.record) {
        let _ = writeln!(out, "{tab}self.{0} = lib.{0}", f.name);
        let _ = writeln!(out, "{tab}self.{}.restype = {}", f.name, f.return_type);
        let args: Vec<String> = f.arguments.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "{tab}self.{}.argtypes = [{}]\n", f.name, args.join(", "));
    }

    let _ = writeln!(out, "{tab}Class._initialized = True");
}

fn display_path(file: &Path, project: &Path) -> String {
    file.strip_prefix(project)
        .unwrap_or(file)
        .display()
        .to_string()
}
