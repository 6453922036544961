//! Declaration handlers: one per declaration kind.
//!
//! Each handler turns one declaration into one binding record (or `None`
//! when the declaration is skipped) and updates the [`TypeContext`] as a side
//! effect. Problems with a single declaration are logged and worked around;
//! a handler never fails.

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::config::FunctionFilter;
use crate::model::*;
use crate::registry::TypeContext;
use crate::resolve::{self, BindingType, Primitive, mangle, unmangle};
use crate::spelling;

// ---------------------------------------------------------------------------
// Typedefs
// ---------------------------------------------------------------------------

/// Record a typedef's alias. Runs before anything else is resolved so that
/// later declarations in any file can rely on it.
pub fn record_typedef(ctx: &mut TypeContext, decl: &TypedefDecl) {
    trace!(alias = %decl.name, underlying = %decl.underlying, "recording alias");
    ctx.aliases.record(&decl.name, &decl.underlying);
}

/// Build the binding for a typedef whose alias was already recorded.
///
/// - function pointer → callable type;
/// - pointer to struct/union → pointer handle, deferred until the
///   aggregates of the same file are emitted (opaque pointer if the
///   aggregate is incomplete);
/// - bare enum → integer, for the preferred alias only;
/// - other pointer or array → the resolved underlying type;
/// - anything else (built-ins, aggregates by value) → nothing, the alias is
///   resolved transparently wherever it is used.
pub fn handle_typedef(ctx: &TypeContext, decl: &TypedefDecl) -> Option<TypedefRecord> {
    let underlying = decl.underlying.as_str();

    if spelling::split_function_pointer(underlying).is_some() {
        return Some(TypedefRecord {
            name: decl.name.clone(),
            rhs: resolve::resolve(ctx, underlying),
            deferred: false,
        });
    }

    let shape = match spelling::decompose(underlying) {
        Ok(shape) => shape,
        Err(e) => {
            warn!(name = %decl.name, err = %e, "skipping typedef");
            return None;
        }
    };
    let is_aggregate =
        shape.base_name.starts_with("struct ") || shape.base_name.starts_with("union ");

    if is_aggregate && shape.pointer_depth > 0 {
        let (rhs, deferred) = match resolve::resolve(ctx, &shape.base_name) {
            BindingType::Named(target) if !ctx.known.is_incomplete(&target) => {
                (resolve::resolve(ctx, underlying), true)
            }
            _ => (BindingType::opaque(), false),
        };
        return Some(TypedefRecord {
            name: decl.name.clone(),
            rhs,
            deferred,
        });
    }

    if shape.base_name.starts_with("enum ")
        && shape.pointer_depth == 0
        && shape.array_dims.is_empty()
    {
        let preferred = ctx
            .aliases
            .resolved_name(&decl.name)
            .unwrap_or_else(|_| decl.name.clone());
        if preferred != decl.name {
            trace!(name = %decl.name, preferred = %preferred, "enum already aliased");
            return None;
        }
        return Some(TypedefRecord {
            name: decl.name.clone(),
            rhs: BindingType::Primitive(Primitive::Int),
            deferred: false,
        });
    }

    if shape.pointer_depth > 0 || !shape.array_dims.is_empty() {
        let rhs = resolve::resolve(ctx, underlying);
        let deferred = references_aggregate(ctx, &rhs);
        return Some(TypedefRecord {
            name: decl.name.clone(),
            rhs,
            deferred,
        });
    }

    trace!(name = %decl.name, "transparent typedef, nothing to emit");
    None
}

/// True if `ty` names a generated aggregate anywhere inside it.
fn references_aggregate(ctx: &TypeContext, ty: &BindingType) -> bool {
    match ty {
        BindingType::Named(name) => {
            ctx.known.is_struct(name)
                || ctx.known.is_struct(&unmangle(name))
                || ctx
                    .aliases
                    .canonical_underlying(name)
                    .is_ok_and(|c| ctx.known.is_struct(&c))
        }
        BindingType::Pointer(inner) => references_aggregate(ctx, inner),
        BindingType::Array { element, .. } => references_aggregate(ctx, element),
        BindingType::Callback {
            return_type,
            params,
        } => {
            references_aggregate(ctx, return_type)
                || params.iter().any(|p| references_aggregate(ctx, p))
        }
        BindingType::Primitive(_) | BindingType::SelfPointer => false,
    }
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

/// Accept `NAME VALUE` and `NAME ( VALUE )`; skip everything else.
pub fn handle_macro(decl: &MacroDecl) -> Option<MacroRecord> {
    if decl.function_like {
        trace!(name = %decl.name, "skipping function-like macro");
        return None;
    }
    let mut tokens = decl.tokens.as_slice();
    // libclang sometimes appends the next line's `#`
    if let [rest @ .., last] = tokens
        && last == "#"
    {
        tokens = rest;
    }

    let value = match tokens {
        [_, value] => value,
        [_, open, value, close] if open == "(" && close == ")" && value != "..." => value,
        _ => {
            trace!(name = %decl.name, tokens = tokens.len(), "skipping macro");
            return None;
        }
    };

    let value = if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        MacroValue::Integer(value.clone())
    } else {
        MacroValue::Literal(value.clone())
    };
    debug!(name = %decl.name, value = %value, "handled macro");
    Some(MacroRecord {
        name: decl.name.clone(),
        value,
    })
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

pub fn handle_enum(ctx: &mut TypeContext, decl: &EnumDecl) -> EnumRecord {
    ctx.known.mark_enum(&decl.spelling);
    let name = ctx
        .aliases
        .resolved_name(&decl.spelling)
        .unwrap_or_else(|e| {
            warn!(name = %decl.spelling, err = %e, "enum name not resolved, using spelling");
            decl.spelling.clone()
        });

    let mut constants = Vec::new();
    for member in &decl.members {
        match member {
            EnumMember::Constant { name, value } => constants.push((name.clone(), *value)),
            EnumMember::Other { kind, name: other } => {
                warn!(name = %name, kind = %kind, member = %other, "unexpected enum member, skipped");
            }
        }
    }

    debug!(name = %name, constants = constants.len(), "handled enum");
    EnumRecord { name, constants }
}

/// The integer alias for an enum known only by its typedef name
/// (`typedef enum { .. } Level_t;` is spelled `Level_t`). The typedef itself
/// is a self-alias and produces no record, so the enum provides it.
pub fn enum_typedef(decl: &EnumDecl, record: &EnumRecord) -> Option<TypedefRecord> {
    if decl.spelling.starts_with("enum ") {
        return None;
    }
    trace!(name = %record.name, "integer alias for typedef-named enum");
    Some(TypedefRecord {
        name: record.name.clone(),
        rhs: BindingType::Primitive(Primitive::Int),
        deferred: false,
    })
}

// ---------------------------------------------------------------------------
// Structs and unions
// ---------------------------------------------------------------------------

/// Handle a struct or union, including the records nested inside it.
///
/// `visited` holds the ids of nested declarations already handled, so a node
/// reached twice is only registered once.
pub fn handle_record(
    ctx: &mut TypeContext,
    visited: &mut HashSet<DeclId>,
    decl: &RecordDecl,
) -> Option<AggregateRecord> {
    if !declares_members(decl) {
        let name = mangle(
            &ctx.aliases
                .resolved_name(&decl.spelling)
                .unwrap_or_else(|_| decl.spelling.clone()),
        );
        if ctx.known.is_struct(&name) && !ctx.known.is_incomplete(&name) {
            debug!(name = %name, "forward declaration after definition, skipped");
            return None;
        }
    }
    Some(build_aggregate(ctx, visited, decl, None))
}

/// True if the declaration has a body that contributes fields.
fn declares_members(decl: &RecordDecl) -> bool {
    decl.members.iter().any(|m| match m {
        RecordMember::Field(_) => true,
        RecordMember::Record(inner) => inner.anonymous,
        _ => false,
    })
}

fn build_aggregate(
    ctx: &mut TypeContext,
    visited: &mut HashSet<DeclId>,
    decl: &RecordDecl,
    synthesized: Option<String>,
) -> AggregateRecord {
    let name = match synthesized {
        Some(name) => name,
        None => {
            let resolved = ctx
                .aliases
                .resolved_name(&decl.spelling)
                .unwrap_or_else(|e| {
                    warn!(name = %decl.spelling, err = %e, "record name not resolved, using spelling");
                    decl.spelling.clone()
                });
            ctx.known.mark_struct(&decl.spelling);
            if decl.anonymous && spelling::is_unnamed_spelling(&resolved) {
                // no typedef names it by value, e.g. `typedef struct {..} *Foo`
                ctx.known.name_anonymous(&decl.spelling, decl.is_union)
            } else {
                mangle(&resolved)
            }
        }
    };
    ctx.known.mark_struct(&name);

    // A definition completes an earlier forward declaration before its own
    // fields are resolved, so `struct S *next` is seen as a self-pointer.
    if declares_members(decl) {
        ctx.known.unmark_incomplete(&name);
    }

    let mut fields: Vec<FieldRecord> = Vec::new();
    let mut nested = Vec::new();
    let mut anon_counter = 0usize;
    let mut anon_type: Option<String> = None;
    let mut scope: Option<String> = None;

    for member in &decl.members {
        match member {
            RecordMember::Record(inner) => {
                let synthetic = format!("{name}_anon_{anon_counter}");
                anon_counter += 1;
                if inner.anonymous {
                    anon_type = Some(synthetic.clone());
                    if scope.is_none() {
                        fields.push(FieldRecord {
                            name: SCOPE_FIELD.to_string(),
                            ty: BindingType::Named(synthetic.clone()),
                            bit_width: 0,
                        });
                        scope = Some(synthetic.clone());
                    }
                }
                if visited.insert(inner.id.clone()) {
                    let synthesized = inner.anonymous.then_some(synthetic);
                    let record = build_aggregate(ctx, visited, inner, synthesized);
                    debug!(parent = %name, nested = %record.name, "handled nested record");
                    nested.push(BindingRecord::Aggregate(record));
                } else {
                    trace!(parent = %name, spelling = %inner.spelling, "nested record already handled");
                }
            }
            RecordMember::Enum(inner) => {
                if visited.insert(inner.id.clone()) {
                    nested.push(BindingRecord::Enum(handle_enum(ctx, inner)));
                }
            }
            RecordMember::Field(field) => {
                let mut ty = if field.anonymous_type {
                    match &anon_type {
                        Some(anon) => {
                            // The anonymous record is a named member after
                            // all, not a transparent scope.
                            if scope.as_deref() == Some(anon.as_str()) {
                                fields.retain(|f| f.name != SCOPE_FIELD);
                                scope = None;
                            }
                            BindingType::Named(anon.clone())
                        }
                        None => {
                            warn!(record = %name, field = %field.name, "anonymous field type without declaration");
                            BindingType::opaque()
                        }
                    }
                } else if field.is_callback() && ctx.aliases.contains(&field.spelling) {
                    // keep the exact alias; identical callback typedefs would
                    // otherwise collapse to the first one
                    BindingType::Named(field.spelling.clone())
                } else {
                    resolve::resolve(ctx, &field.spelling)
                };

                if !ty.replace_pointer_to(&name)
                    && let Some(handle) = handle_to(ctx, &field.spelling, &name)
                {
                    ty.replace_handle(&handle);
                }

                trace!(record = %name, field = %field.name, ty = %ty, "  field");
                fields.push(FieldRecord {
                    name: field.name.clone(),
                    ty,
                    bit_width: field.bitfield_width.unwrap_or(0),
                });
            }
            RecordMember::Other { kind, name: other } => {
                warn!(record = %name, kind = %kind, member = %other, "unexpected record member, skipped");
            }
        }
    }

    let incomplete = fields.is_empty();
    if incomplete {
        ctx.known.mark_incomplete(&name);
    } else {
        ctx.known.unmark_incomplete(&name);
    }

    debug!(name = %name, fields = fields.len(), incomplete, "handled record");
    AggregateRecord {
        name,
        is_union: decl.is_union,
        fields,
        incomplete,
        nested,
    }
}

/// If `field_spelling` goes through an alias whose canonical type points at
/// the aggregate `aggregate_name`, return the name that alias resolves to.
fn handle_to(ctx: &TypeContext, field_spelling: &str, aggregate_name: &str) -> Option<String> {
    let base = spelling::decompose(field_spelling).ok()?.base_name;
    let field_canonical = ctx.aliases.canonical_underlying(&base).ok()?;
    let field_target = spelling::decompose(&field_canonical).ok()?.base_name;
    let own = unmangle(&ctx.aliases.canonical_underlying(aggregate_name).ok()?);
    if field_target != own {
        return None;
    }
    ctx.aliases.resolved_name(&base).ok()
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// Resolve a function prototype. Excluded names are skipped before any type
/// is resolved.
pub fn handle_function(
    ctx: &TypeContext,
    filter: &FunctionFilter,
    decl: &FunctionDecl,
) -> Option<FunctionRecord> {
    if filter.excludes(&decl.name) {
        trace!(name = %decl.name, "excluded function");
        return None;
    }

    let return_type = resolve::resolve(ctx, &decl.result);
    let arguments = decl
        .arguments
        .iter()
        .map(|arg| match resolve::resolve(ctx, arg) {
            // array parameters decay to pointers
            BindingType::Array { element, .. } => BindingType::Pointer(element),
            other => other,
        })
        .collect::<Vec<_>>();

    debug!(name = %decl.name, args = arguments.len(), "handled function");
    Some(FunctionRecord {
        name: decl.name.clone(),
        return_type,
        arguments,
    })
}
