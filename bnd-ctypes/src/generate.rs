//! Traversal driver: runs the handlers over the translation units in input
//! order and collects the records.
//!
//! Two passes: the first records every typedef alias of every file, the
//! second handles every declaration. Typedef bindings are built last, once
//! all aggregates and enums are known.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::FunctionFilter;
use crate::handlers;
use crate::model::*;
use crate::registry::TypeContext;

pub struct Generator {
    ctx: TypeContext,
    filter: FunctionFilter,
    visited: HashSet<DeclId>,
    bindings: Bindings,
    typedefs: Vec<(PathBuf, TypedefDecl)>,
}

impl Generator {
    pub fn new(ctx: TypeContext, filter: FunctionFilter) -> Self {
        Self {
            ctx,
            filter,
            visited: HashSet::new(),
            bindings: Bindings::default(),
            typedefs: Vec::new(),
        }
    }

    /// Run both passes over `units` and return the collected bindings.
    pub fn run(ctx: TypeContext, filter: FunctionFilter, units: &[TranslationUnit]) -> Bindings {
        let mut generator = Self::new(ctx, filter);
        for unit in units {
            generator.record_aliases(unit);
        }
        for unit in units {
            generator.visit(unit);
        }
        generator.finish()
    }

    pub fn context(&self) -> &TypeContext {
        &self.ctx
    }

    /// Pass 1: record the aliases of the typedefs located in `unit`'s file.
    pub fn record_aliases(&mut self, unit: &TranslationUnit) {
        let mut count = 0usize;
        for decl in own_declarations(unit) {
            if let Declaration::Typedef(td) = decl {
                handlers::record_typedef(&mut self.ctx, td);
                count += 1;
            }
        }
        debug!(file = %unit.path.display(), typedefs = count, "recorded aliases");
    }

    /// Pass 2: handle every declaration located in `unit`'s file.
    pub fn visit(&mut self, unit: &TranslationUnit) {
        let file = unit.path.as_path();
        self.bindings.add_file(file);

        let (mut typedefs, mut others, mut skipped) = (0usize, 0usize, 0usize);
        for decl in own_declarations(unit) {
            if !self.visited.insert(decl.id().clone()) {
                skipped += 1;
                continue;
            }
            let record = match decl {
                Declaration::Typedef(td) => {
                    self.typedefs.push((unit.path.clone(), td.clone()));
                    typedefs += 1;
                    continue;
                }
                Declaration::Macro(m) => handlers::handle_macro(m).map(BindingRecord::Macro),
                Declaration::Enum(e) => {
                    let record = handlers::handle_enum(&mut self.ctx, e);
                    if let Some(alias) = handlers::enum_typedef(e, &record) {
                        self.bindings.push(file, BindingRecord::Typedef(alias));
                    }
                    Some(BindingRecord::Enum(record))
                }
                Declaration::Record(r) => {
                    handlers::handle_record(&mut self.ctx, &mut self.visited, r)
                        .map(BindingRecord::Aggregate)
                }
                Declaration::Function(f) => {
                    handlers::handle_function(&self.ctx, &self.filter, f).map(BindingRecord::Function)
                }
            };
            match record {
                Some(record) => {
                    others += 1;
                    self.bindings.push(file, record);
                }
                None => skipped += 1,
            }
        }

        info!(
            file = %unit.path.display(),
            typedefs,
            records = others,
            skipped,
            "handled translation unit"
        );
    }

    /// Build the typedef bindings and return everything collected.
    pub fn finish(mut self) -> Bindings {
        for (file, td) in &self.typedefs {
            if let Some(record) = handlers::handle_typedef(&self.ctx, td) {
                self.bindings.push(file, BindingRecord::Typedef(record));
            }
        }
        self.bindings
    }
}

/// Declarations physically located in the unit's own file, not pulled in
/// from includes.
fn own_declarations(unit: &TranslationUnit) -> impl Iterator<Item = &Declaration> {
    unit.declarations
        .iter()
        .filter(|d| d.file() == unit.path.as_path())
}
