//! Type resolution: raw C spelling → binding type expression.

use std::fmt;

use tracing::warn;

use crate::error::Result;
use crate::registry::TypeContext;
use crate::spelling::{self, DecomposedType};

/// Binding primitives of the `ctypes` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Untyped pointer-sized handle: voids, hidden and unresolved types.
    VoidPtr,
    Bool,
    Char,
    /// `char *`
    CharPtr,
    SizeT,
    /// Integer used for enums and integer macros.
    Int,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Long,
    ULong,
    F32,
    F64,
}

impl Primitive {
    /// Look up a qualifier-free C spelling in the built-in table.
    pub fn from_c_name(name: &str) -> Option<Self> {
        let p = match name {
            "void" => Primitive::VoidPtr,
            "bool" | "_Bool" => Primitive::Bool,
            "char" => Primitive::Char,
            "size_t" => Primitive::SizeT,

            "unsigned char" | "uint8_t" => Primitive::U8,
            "unsigned short" | "unsigned short int" | "uint16_t" => Primitive::U16,
            "unsigned int" | "unsigned" | "uint32_t" => Primitive::U32,
            "unsigned long long" | "unsigned long long int" | "uint64_t" => Primitive::U64,

            "signed char" | "int8_t" => Primitive::I8,
            "short" | "short int" | "signed short" | "int16_t" => Primitive::I16,
            "int" | "signed int" | "signed" | "int32_t" => Primitive::I32,
            "long long" | "long long int" | "signed long long" | "int64_t" => Primitive::I64,

            "long" | "long int" | "signed long" => Primitive::Long,
            "unsigned long" | "unsigned long int" => Primitive::ULong,
            "float" => Primitive::F32,
            "double" => Primitive::F64,
            _ => return None,
        };
        Some(p)
    }

    pub fn as_ctypes(self) -> &'static str {
        match self {
            Primitive::VoidPtr => "c_void_p",
            Primitive::Bool => "c_bool",
            Primitive::Char => "c_char",
            Primitive::CharPtr => "c_char_p",
            Primitive::SizeT => "c_size_t",
            Primitive::Int => "c_int",
            Primitive::I8 => "c_int8",
            Primitive::U8 => "c_uint8",
            Primitive::I16 => "c_int16",
            Primitive::U16 => "c_uint16",
            Primitive::I32 => "c_int32",
            Primitive::U32 => "c_uint32",
            Primitive::I64 => "c_int64",
            Primitive::U64 => "c_uint64",
            Primitive::Long => "c_long",
            Primitive::ULong => "c_ulong",
            Primitive::F32 => "c_float",
            Primitive::F64 => "c_double",
        }
    }
}

/// Identifier emitted for "pointer to the aggregate being defined".
pub const SELF_POINTER: &str = "this";

/// A resolved binding type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingType {
    Primitive(Primitive),
    /// A generated aggregate (`struct_Foo`) or alias name.
    Named(String),
    Pointer(Box<BindingType>),
    Array {
        element: Box<BindingType>,
        len: usize,
    },
    Callback {
        return_type: Box<BindingType>,
        params: Vec<BindingType>,
    },
    /// Pointer to the enclosing aggregate.
    SelfPointer,
}

impl BindingType {
    pub fn opaque() -> Self {
        BindingType::Primitive(Primitive::VoidPtr)
    }

    pub fn named(name: impl Into<String>) -> Self {
        BindingType::Named(name.into())
    }

    pub fn pointer(inner: BindingType) -> Self {
        BindingType::Pointer(Box::new(inner))
    }

    pub fn array(element: BindingType, len: usize) -> Self {
        BindingType::Array {
            element: Box::new(element),
            len,
        }
    }

    /// Replace every `Pointer(Named(name))` with [`BindingType::SelfPointer`].
    /// Returns true if anything was replaced.
    pub fn replace_pointer_to(&mut self, name: &str) -> bool {
        match self {
            BindingType::Pointer(inner) => {
                if matches!(inner.as_ref(), BindingType::Named(n) if n == name) {
                    *self = BindingType::SelfPointer;
                    true
                } else {
                    inner.replace_pointer_to(name)
                }
            }
            BindingType::Array { element, .. } => element.replace_pointer_to(name),
            _ => false,
        }
    }

    /// Replace `Named(name)` and the opaque pointer with
    /// [`BindingType::SelfPointer`], for fields typed through an alias that
    /// points back at the enclosing aggregate.
    pub fn replace_handle(&mut self, name: &str) {
        match self {
            BindingType::Named(n) if n == name => *self = BindingType::SelfPointer,
            BindingType::Primitive(Primitive::VoidPtr) => *self = BindingType::SelfPointer,
            BindingType::Pointer(inner) => inner.replace_handle(name),
            BindingType::Array { element, .. } => element.replace_handle(name),
            _ => {}
        }
    }
}

impl fmt::Display for BindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingType::Primitive(p) => f.write_str(p.as_ctypes()),
            BindingType::Named(name) => f.write_str(name),
            BindingType::Pointer(inner) => write!(f, "POINTER({inner})"),
            BindingType::Array { element, len } => write!(f, "{element} * {len}"),
            BindingType::Callback {
                return_type,
                params,
            } => {
                write!(f, "CFUNCTYPE({return_type}")?;
                for p in params {
                    write!(f, ", {p}")?;
                }
                f.write_str(")")
            }
            BindingType::SelfPointer => f.write_str(SELF_POINTER),
        }
    }
}

/// `struct Foo` → `struct_Foo`, `union Foo` → `union_Foo`; other names are
/// returned unchanged.
pub fn mangle(spelling: &str) -> String {
    if let Some(rest) = spelling.strip_prefix("struct ") {
        format!("struct_{rest}")
    } else if let Some(rest) = spelling.strip_prefix("union ") {
        format!("union_{rest}")
    } else {
        spelling.to_string()
    }
}

/// Inverse of [`mangle`].
pub fn unmangle(name: &str) -> String {
    if let Some(rest) = name.strip_prefix("struct_") {
        format!("struct {rest}")
    } else if let Some(rest) = name.strip_prefix("union_") {
        format!("union {rest}")
    } else {
        name.to_string()
    }
}

fn is_aggregate_spelling(s: &str) -> bool {
    s.starts_with("struct ") || s.starts_with("union ")
}

/// Resolve a spelling, falling back to the opaque pointer (with a warning)
/// when it is malformed or unknown. Never fails.
pub fn resolve(ctx: &TypeContext, spelling: &str) -> BindingType {
    match try_resolve(ctx, spelling) {
        Ok(ty) => ty,
        Err(e) => {
            warn!(
                spelling,
                err = %e,
                fallback = Primitive::VoidPtr.as_ctypes(),
                "type could not be resolved"
            );
            BindingType::opaque()
        }
    }
}

/// Resolve a spelling, surfacing malformed spellings and cyclic typedefs as
/// errors. Unknown types still resolve to the opaque pointer.
pub fn try_resolve(ctx: &TypeContext, spelling: &str) -> Result<BindingType> {
    if let Some(sig) = spelling::split_function_pointer(spelling) {
        let mut ty = BindingType::Callback {
            return_type: Box::new(try_resolve(ctx, &sig.return_type)?),
            params: sig
                .params
                .iter()
                .map(|p| try_resolve(ctx, p))
                .collect::<Result<_>>()?,
        };
        for _ in 1..sig.pointer_depth {
            ty = BindingType::pointer(ty);
        }
        return Ok(ty);
    }

    let DecomposedType {
        base_name,
        mut pointer_depth,
        array_dims,
        leading_unsized,
    } = spelling::decompose(spelling)?;
    // a folded `[]` in front of sized dimensions points at the whole array
    let outer_pointers = usize::from(leading_unsized && !array_dims.is_empty());
    pointer_depth -= outer_pointers;
    let resolved = ctx.aliases.resolved_name(&base_name)?;
    let resolved = match ctx.known.anonymous_name(&resolved) {
        Some(name) => name.to_string(),
        None => resolved,
    };
    let canonical = ctx.aliases.canonical_underlying(&resolved)?;

    let base = if let Some(primitive) = Primitive::from_c_name(&resolved) {
        match primitive {
            Primitive::VoidPtr => {
                pointer_depth = pointer_depth.saturating_sub(1);
                BindingType::Primitive(primitive)
            }
            Primitive::Char if pointer_depth > 0 => {
                pointer_depth -= 1;
                BindingType::Primitive(Primitive::CharPtr)
            }
            _ => BindingType::Primitive(primitive),
        }
    } else if ctx.is_hidden(&resolved) || ctx.is_hidden(&base_name) {
        pointer_depth = pointer_depth.saturating_sub(1);
        BindingType::opaque()
    } else if resolved.starts_with("enum ") && ctx.known.is_enum(&resolved) {
        BindingType::Primitive(Primitive::Int)
    } else if is_aggregate_spelling(&resolved) && ctx.known.is_struct(&resolved) {
        aggregate(ctx, mangle(&resolved), &mut pointer_depth)
    } else if ctx.known.is_struct(&canonical) {
        aggregate(ctx, resolved, &mut pointer_depth)
    } else if ctx.known.is_enum(&canonical) {
        BindingType::Named(resolved)
    } else if ctx.aliases.contains(&resolved)
        && spelling::split_function_pointer(&canonical).is_some()
    {
        BindingType::Named(resolved)
    } else if ctx.aliases.contains(&resolved) && (canonical.contains('*') || canonical.contains('['))
    {
        BindingType::Named(resolved)
    } else {
        warn!(
            spelling,
            base = %base_name,
            fallback = Primitive::VoidPtr.as_ctypes(),
            "type was not recognized, replaced with opaque pointer"
        );
        BindingType::opaque()
    };

    let mut ty = base;
    for _ in 0..pointer_depth {
        ty = BindingType::pointer(ty);
    }
    for &len in array_dims.iter().rev() {
        ty = BindingType::array(ty, len);
    }
    for _ in 0..outer_pointers {
        ty = BindingType::pointer(ty);
    }
    Ok(ty)
}

/// A known aggregate by its generated name; pointers to incomplete
/// aggregates degrade to the opaque pointer.
fn aggregate(ctx: &TypeContext, name: String, pointer_depth: &mut usize) -> BindingType {
    if *pointer_depth > 0 && ctx.known.is_incomplete(&name) {
        *pointer_depth -= 1;
        BindingType::opaque()
    } else {
        BindingType::Named(name)
    }
}
