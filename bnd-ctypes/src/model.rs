//! Intermediate model types: the bridge between clang extraction, the
//! handlers and emission.
//!
//! The declaration side is what the front end hands over, one
//! [`TranslationUnit`] per parsed file. The record side is what the handlers
//! produce. Both are clang-independent so the engine can be tested without
//! libclang.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::resolve::BindingType;

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Identity of an AST node: where its spelling starts.
///
/// Two paths through the AST that reach the same node yield the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclId {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl DeclId {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub path: PathBuf,
    /// Top-level declarations in source order, including those pulled in
    /// from included headers.
    pub declarations: Vec<Declaration>,
}

/// A top-level declaration, one variant per handled kind.
#[derive(Debug, Clone)]
pub enum Declaration {
    Typedef(TypedefDecl),
    Macro(MacroDecl),
    Enum(EnumDecl),
    Record(RecordDecl),
    Function(FunctionDecl),
}

impl Declaration {
    pub fn id(&self) -> &DeclId {
        match self {
            Declaration::Typedef(d) => &d.id,
            Declaration::Macro(d) => &d.id,
            Declaration::Enum(d) => &d.id,
            Declaration::Record(d) => &d.id,
            Declaration::Function(d) => &d.id,
        }
    }

    /// File the declaration is physically located in.
    pub fn file(&self) -> &Path {
        &self.id().file
    }
}

/// `typedef <underlying> <name>;`
#[derive(Debug, Clone)]
pub struct TypedefDecl {
    pub id: DeclId,
    pub name: String,
    pub underlying: String,
}

/// `#define NAME ...`
#[derive(Debug, Clone)]
pub struct MacroDecl {
    pub id: DeclId,
    pub name: String,
    /// Token spellings of the whole definition, name first.
    pub tokens: Vec<String>,
    pub function_like: bool,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub id: DeclId,
    /// Type spelling, e.g. `enum Color`.
    pub spelling: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone)]
pub enum EnumMember {
    Constant { name: String, value: i64 },
    Other { kind: String, name: String },
}

/// A struct or union declaration.
#[derive(Debug, Clone)]
pub struct RecordDecl {
    pub id: DeclId,
    /// Type spelling, e.g. `struct Point` or
    /// `union (unnamed at a.h:4:5)`.
    pub spelling: String,
    pub is_union: bool,
    /// The record has no tag name.
    pub anonymous: bool,
    pub members: Vec<RecordMember>,
}

#[derive(Debug, Clone)]
pub enum RecordMember {
    Field(FieldDecl),
    Record(RecordDecl),
    Enum(EnumDecl),
    Other { kind: String, name: String },
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    /// Declared type spelling.
    pub spelling: String,
    /// Canonical type spelling (all typedefs expanded).
    pub canonical: String,
    pub bitfield_width: Option<usize>,
    /// The field's type is the anonymous record declared just before it.
    pub anonymous_type: bool,
}

impl FieldDecl {
    /// A field whose canonical type is a function pointer.
    pub fn is_callback(&self) -> bool {
        self.canonical.contains("(*)")
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub id: DeclId,
    pub name: String,
    pub result: String,
    /// Argument type spellings in call order.
    pub arguments: Vec<String>,
}

// ---------------------------------------------------------------------------
// Binding records
// ---------------------------------------------------------------------------

/// `alias = rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct TypedefRecord {
    pub name: String,
    pub rhs: BindingType,
    /// Emit after the aggregates of the same file.
    pub deferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroValue {
    /// Purely decimal digits, wrapped in the integer constructor.
    Integer(String),
    /// Passed through verbatim.
    Literal(String),
}

impl fmt::Display for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroValue::Integer(v) => write!(f, "c_int({v})"),
            MacroValue::Literal(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroRecord {
    pub name: String,
    pub value: MacroValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumRecord {
    pub name: String,
    pub constants: Vec<(String, i64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub name: String,
    pub ty: BindingType,
    /// 0 when not a bitfield.
    pub bit_width: usize,
}

/// Name of the pseudo-field standing for a transparent anonymous member.
pub const SCOPE_FIELD: &str = "_scope";

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub name: String,
    pub is_union: bool,
    pub fields: Vec<FieldRecord>,
    pub incomplete: bool,
    /// Records for declarations nested inside this one, emitted before it.
    pub nested: Vec<BindingRecord>,
}

impl AggregateRecord {
    pub fn field(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_scope(&self) -> bool {
        self.field(SCOPE_FIELD).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRecord {
    pub name: String,
    pub return_type: BindingType,
    pub arguments: Vec<BindingType>,
}

/// Result of handling one declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingRecord {
    Typedef(TypedefRecord),
    Macro(MacroRecord),
    Enum(EnumRecord),
    Aggregate(AggregateRecord),
    Function(FunctionRecord),
}

impl BindingRecord {
    pub fn name(&self) -> &str {
        match self {
            BindingRecord::Typedef(r) => &r.name,
            BindingRecord::Macro(r) => &r.name,
            BindingRecord::Enum(r) => &r.name,
            BindingRecord::Aggregate(r) => &r.name,
            BindingRecord::Function(r) => &r.name,
        }
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// A record tagged with the file its declaration came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    pub file: PathBuf,
    pub record: T,
}

/// Everything produced by a run, per kind, in handling order.
#[derive(Debug, Default)]
pub struct Bindings {
    /// Processed files in input order.
    pub files: Vec<PathBuf>,
    pub typedefs: Vec<Located<TypedefRecord>>,
    pub macros: Vec<Located<MacroRecord>>,
    pub enums: Vec<Located<EnumRecord>>,
    pub aggregates: Vec<Located<AggregateRecord>>,
    pub functions: Vec<Located<FunctionRecord>>,
}

impl Bindings {
    pub fn add_file(&mut self, file: &Path) {
        if !self.files.iter().any(|f| f == file) {
            self.files.push(file.to_path_buf());
        }
    }

    /// Add a record. A record with the same name and kind replaces the
    /// earlier one in place. Records nested in an aggregate are added before
    /// it.
    pub fn push(&mut self, file: &Path, record: BindingRecord) {
        match record {
            BindingRecord::Typedef(r) => upsert(&mut self.typedefs, file, r, |r| &r.name),
            BindingRecord::Macro(r) => upsert(&mut self.macros, file, r, |r| &r.name),
            BindingRecord::Enum(r) => upsert(&mut self.enums, file, r, |r| &r.name),
            BindingRecord::Aggregate(mut r) => {
                for nested in std::mem::take(&mut r.nested) {
                    self.push(file, nested);
                }
                upsert(&mut self.aggregates, file, r, |r| &r.name);
            }
            BindingRecord::Function(r) => upsert(&mut self.functions, file, r, |r| &r.name),
        }
    }

    pub fn aggregate(&self, name: &str) -> Option<&AggregateRecord> {
        find(&self.aggregates, |r| r.name == name)
    }

    pub fn enumeration(&self, name: &str) -> Option<&EnumRecord> {
        find(&self.enums, |r| r.name == name)
    }

    pub fn typedef(&self, name: &str) -> Option<&TypedefRecord> {
        find(&self.typedefs, |r| r.name == name)
    }

    pub fn macro_def(&self, name: &str) -> Option<&MacroRecord> {
        find(&self.macros, |r| r.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionRecord> {
        find(&self.functions, |r| r.name == name)
    }
}

/// Records of `list` that belong to `file`, in order.
pub fn in_file<'a, T>(list: &'a [Located<T>], file: &'a Path) -> impl Iterator<Item = &'a T> + 'a {
    list.iter()
        .filter(move |l| l.file == file)
        .map(|l| &l.record)
}

fn find<T>(list: &[Located<T>], pred: impl Fn(&T) -> bool) -> Option<&T> {
    list.iter().map(|l| &l.record).find(|r| pred(r))
}

fn upsert<T>(list: &mut Vec<Located<T>>, file: &Path, record: T, name: impl Fn(&T) -> &str) {
    let located = Located {
        file: file.to_path_buf(),
        record,
    };
    match list
        .iter()
        .position(|l| name(&l.record) == name(&located.record))
    {
        Some(i) => list[i] = located,
        None => list.push(located),
    }
}
