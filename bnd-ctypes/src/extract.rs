//! Extraction: clang `Entity`/`Type` → declaration model.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clang::diagnostic::Severity;
use clang::{Entity, EntityKind, Index, Type as ClangType, TypeKind};
use tracing::{debug, trace, warn};

use crate::model::*;

/// Parse one source file and collect its top-level declarations, including
/// those pulled in from included headers.
pub fn extract_unit(index: &Index, path: &Path, args: &[String]) -> Result<TranslationUnit> {
    let path_str = path
        .to_str()
        .with_context(|| format!("non UTF-8 source path {}", path.display()))?;
    debug!(file = %path.display(), args = args.len(), "parsing translation unit");

    let tu = index
        .parser(path_str)
        .arguments(&args.iter().map(|s| s.as_str()).collect::<Vec<_>>())
        .detailed_preprocessing_record(true)
        .skip_function_bodies(true)
        .parse()
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {:?}", path.display(), e))?;

    for diag in tu.get_diagnostics() {
        if matches!(diag.get_severity(), Severity::Error | Severity::Fatal) {
            warn!(file = %path.display(), diagnostic = %diag.get_text(), "clang diagnostic");
        }
    }

    // clang's spelling of the main file, so own-file filtering compares like
    // with like
    let unit_path = tu
        .get_file(path)
        .map(|f| f.get_path())
        .unwrap_or_else(|| path.to_path_buf());

    let mut declarations = Vec::new();
    for entity in tu.get_entity().get_children() {
        if let Some(decl) = extract_declaration(&entity) {
            declarations.push(decl);
        }
    }

    debug!(
        file = %unit_path.display(),
        declarations = declarations.len(),
        "extraction complete"
    );
    Ok(TranslationUnit {
        path: unit_path,
        declarations,
    })
}

fn extract_declaration(entity: &Entity) -> Option<Declaration> {
    let id = decl_id(entity)?;
    let decl = match entity.get_kind() {
        EntityKind::TypedefDecl => Declaration::Typedef(extract_typedef(entity, id)?),
        EntityKind::MacroDefinition => Declaration::Macro(extract_macro(entity, id)?),
        EntityKind::EnumDecl => Declaration::Enum(extract_enum(entity, id)),
        EntityKind::StructDecl | EntityKind::UnionDecl => {
            Declaration::Record(extract_record(entity, id))
        }
        EntityKind::FunctionDecl => Declaration::Function(extract_function(entity, id)?),
        other => {
            trace!(kind = ?other, name = ?entity.get_name(), "ignoring top-level entity");
            return None;
        }
    };
    Some(decl)
}

/// Where the entity's spelling starts. Built-in entities have no file and
/// yield `None`.
fn decl_id(entity: &Entity) -> Option<DeclId> {
    let location = entity.get_location()?.get_file_location();
    let file = location.file?;
    Some(DeclId::new(file.get_path(), location.line, location.column))
}

fn type_spelling(ty: &ClangType) -> String {
    ty.get_display_name()
}

// ---------------------------------------------------------------------------
// Typedefs and macros
// ---------------------------------------------------------------------------

fn extract_typedef(entity: &Entity, id: DeclId) -> Option<TypedefDecl> {
    let name = entity.get_name().filter(|n| !n.is_empty())?;
    let underlying = match entity.get_typedef_underlying_type() {
        Some(ut) => type_spelling(&ut),
        None => {
            warn!(name = %name, "typedef has no underlying type");
            return None;
        }
    };
    trace!(name = %name, underlying = %underlying, "extracted typedef");
    Some(TypedefDecl {
        id,
        name,
        underlying,
    })
}

fn extract_macro(entity: &Entity, id: DeclId) -> Option<MacroDecl> {
    let name = entity.get_name().filter(|n| !n.is_empty())?;
    let tokens = entity
        .get_range()
        .map(|range| range.tokenize().iter().map(|t| t.get_spelling()).collect())
        .unwrap_or_default();
    Some(MacroDecl {
        id,
        name,
        tokens,
        function_like: entity.is_function_like_macro(),
    })
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

fn extract_enum(entity: &Entity, id: DeclId) -> EnumDecl {
    let spelling = entity
        .get_type()
        .map(|t| type_spelling(&t))
        .unwrap_or_else(|| format!("enum {}", entity.get_name().unwrap_or_default()));

    let members = entity
        .get_children()
        .iter()
        .map(|child| match child.get_kind() {
            EntityKind::EnumConstantDecl => EnumMember::Constant {
                name: child.get_name().unwrap_or_default(),
                value: child.get_enum_constant_value().map(|(s, _)| s).unwrap_or(0),
            },
            kind => EnumMember::Other {
                kind: format!("{kind:?}"),
                name: child.get_name().unwrap_or_default(),
            },
        })
        .collect();

    EnumDecl {
        id,
        spelling,
        members,
    }
}

// ---------------------------------------------------------------------------
// Structs and unions
// ---------------------------------------------------------------------------

fn extract_record(entity: &Entity, id: DeclId) -> RecordDecl {
    let spelling = entity
        .get_type()
        .map(|t| type_spelling(&t))
        .unwrap_or_default();
    let is_union = entity.get_kind() == EntityKind::UnionDecl;
    let anonymous = is_anonymous_record(entity, &spelling);

    let mut members = Vec::new();
    for child in entity.get_children() {
        match child.get_kind() {
            EntityKind::FieldDecl => {
                if let Some(field) = extract_field(&child) {
                    members.push(RecordMember::Field(field));
                }
            }
            EntityKind::StructDecl | EntityKind::UnionDecl => match decl_id(&child) {
                Some(child_id) => members.push(RecordMember::Record(extract_record(&child, child_id))),
                None => warn!(record = %spelling, "nested record without location"),
            },
            EntityKind::EnumDecl => match decl_id(&child) {
                Some(child_id) => members.push(RecordMember::Enum(extract_enum(&child, child_id))),
                None => warn!(record = %spelling, "nested enum without location"),
            },
            kind => members.push(RecordMember::Other {
                kind: format!("{kind:?}"),
                name: child.get_name().unwrap_or_default(),
            }),
        }
    }

    trace!(spelling = %spelling, members = members.len(), anonymous, "extracted record");
    RecordDecl {
        id,
        spelling,
        is_union,
        anonymous,
        members,
    }
}

/// clang names unnamed records like `union (unnamed at file.h:37:5)`.
fn is_anonymous_record(entity: &Entity, spelling: &str) -> bool {
    entity.is_anonymous() || spelling.contains("(unnamed") || spelling.contains("(anonymous")
}

fn extract_field(child: &Entity) -> Option<FieldDecl> {
    let ty = child.get_type()?;
    // the implicit member clang creates for a transparent anonymous record
    // has no name; the record itself already stands for it
    let name = child.get_name().filter(|n| !n.is_empty())?;

    let canonical = ty.get_canonical_type();
    let anonymous_type = canonical.get_kind() == TypeKind::Record
        && canonical
            .get_declaration()
            .is_some_and(|d| is_anonymous_record(&d, &type_spelling(&canonical)));
    let bitfield_width = if child.is_bit_field() {
        child.get_bit_field_width()
    } else {
        None
    };

    Some(FieldDecl {
        name,
        spelling: type_spelling(&ty),
        canonical: type_spelling(&canonical),
        bitfield_width,
        anonymous_type,
    })
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn extract_function(entity: &Entity, id: DeclId) -> Option<FunctionDecl> {
    let name = entity.get_name().filter(|n| !n.is_empty())?;
    let fn_type = match entity.get_type() {
        Some(t) => t,
        None => {
            warn!(name = %name, "function has no type");
            return None;
        }
    };
    let result = fn_type
        .get_result_type()
        .map(|t| type_spelling(&t))
        .unwrap_or_else(|| "void".to_string());
    let arguments: Vec<String> = fn_type
        .get_argument_types()
        .unwrap_or_default()
        .iter()
        .map(type_spelling)
        .collect();
    if entity.is_variadic() {
        debug!(name = %name, "variadic function, only fixed arguments are bound");
    }

    Some(FunctionDecl {
        id,
        name,
        result,
        arguments,
    })
}

/// Source files resolved, in order, as clang will see them.
pub fn existing_sources(files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    files
        .iter()
        .map(|f| {
            if f.exists() {
                Ok(f.clone())
            } else {
                anyhow::bail!("source file not found: {}", f.display())
            }
        })
        .collect()
}
