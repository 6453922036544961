//! Registries of everything seen so far: typedef aliases and the names known
//! to be aggregates, enums or incomplete aggregates.
//!
//! Both are populated strictly in traversal order and never rolled back. A
//! later declaration of the same name overwrites the earlier one.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::{Error, Result};
use crate::resolve::Primitive;

/// Bidirectional typedef map.
///
/// `aliases` maps each alias name to its underlying spelling. `underlyings`
/// maps an underlying spelling to the aliases declared for it in the order
/// they were first seen; the first entry is the preferred alias.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    aliases: HashMap<String, String>,
    underlyings: HashMap<String, Vec<String>>,
}

impl AliasRegistry {
    /// Record `alias` as a name for `underlying`.
    ///
    /// Re-recording with the same underlying is a no-op. Re-recording with a
    /// different underlying moves the alias: it is pruned from the old
    /// underlying's list so no stale reverse link remains.
    pub fn record(&mut self, alias: &str, underlying: &str) {
        if alias == underlying {
            trace!(alias, "ignoring self-alias");
            return;
        }
        match self
            .aliases
            .insert(alias.to_string(), underlying.to_string())
        {
            Some(previous) if previous == underlying => return,
            Some(previous) => {
                trace!(alias, previous = %previous, underlying, "alias redeclared");
                if let Some(list) = self.underlyings.get_mut(&previous) {
                    list.retain(|a| a != alias);
                    if list.is_empty() {
                        self.underlyings.remove(&previous);
                    }
                }
            }
            None => {}
        }
        let list = self.underlyings.entry(underlying.to_string()).or_default();
        if !list.iter().any(|a| a == alias) {
            list.push(alias.to_string());
        }
    }

    /// True if `name` was recorded as an alias.
    pub fn contains(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// The spelling `alias` was declared equal to, one step down the chain.
    pub fn underlying(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Follow the alias chain from `spelling` to a spelling that is not itself
    /// an alias.
    pub fn canonical_underlying(&self, spelling: &str) -> Result<String> {
        let mut current = spelling;
        let mut steps = 0;
        while let Some(next) = self.aliases.get(current) {
            steps += 1;
            if steps > self.aliases.len() {
                return Err(Error::CyclicTypedef {
                    alias: spelling.to_string(),
                });
            }
            current = next;
        }
        Ok(current.to_string())
    }

    /// First alias recorded for `underlying`.
    pub fn preferred_alias(&self, underlying: &str) -> Option<&str> {
        self.underlyings
            .get(underlying)
            .and_then(|list| list.first())
            .map(String::as_str)
    }

    /// All aliases recorded for `underlying`, first-seen first.
    pub fn aliases_of(&self, underlying: &str) -> &[String] {
        self.underlyings
            .get(underlying)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The name a spelling should be generated under:
    ///
    /// - built-in spellings are returned unchanged;
    /// - aliases of built-ins resolve to the built-in;
    /// - user types resolve to the preferred alias of their canonical
    ///   underlying spelling, if one exists;
    /// - otherwise the spelling itself.
    pub fn resolved_name(&self, spelling: &str) -> Result<String> {
        if Primitive::from_c_name(spelling).is_some() {
            return Ok(spelling.to_string());
        }
        let canonical = self.canonical_underlying(spelling)?;
        if Primitive::from_c_name(&canonical).is_some() {
            return Ok(canonical);
        }
        if let Some(alias) = self.preferred_alias(&canonical) {
            return Ok(alias.to_string());
        }
        Ok(spelling.to_string())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Names recognized as aggregates (`struct X`, `union X`, synthesized
/// anonymous names), enums (`enum X`) and incomplete aggregates (by the name
/// they are generated under).
#[derive(Debug, Default)]
pub struct KnownTypes {
    structs: HashSet<String>,
    enums: HashSet<String>,
    incomplete: HashSet<String>,
    /// Generated names of top-level anonymous aggregates, by spelling.
    anonymous: HashMap<String, String>,
}

impl KnownTypes {
    pub fn mark_struct(&mut self, name: &str) {
        self.structs.insert(name.to_string());
    }

    pub fn mark_enum(&mut self, name: &str) {
        self.enums.insert(name.to_string());
    }

    pub fn mark_incomplete(&mut self, name: &str) {
        self.incomplete.insert(name.to_string());
    }

    pub fn unmark_incomplete(&mut self, name: &str) {
        self.incomplete.remove(name);
    }

    pub fn is_struct(&self, name: &str) -> bool {
        self.structs.contains(name)
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.contains(name)
    }

    pub fn is_incomplete(&self, name: &str) -> bool {
        self.incomplete.contains(name)
    }

    /// The generated name for the anonymous aggregate spelled `spelling`,
    /// assigned in order of first request: `struct_anon_0`, `union_anon_1`...
    pub fn name_anonymous(&mut self, spelling: &str, is_union: bool) -> String {
        let next = self.anonymous.len();
        self.anonymous
            .entry(spelling.to_string())
            .or_insert_with(|| {
                let kind = if is_union { "union" } else { "struct" };
                format!("{kind}_anon_{next}")
            })
            .clone()
    }

    pub fn anonymous_name(&self, spelling: &str) -> Option<&str> {
        self.anonymous.get(spelling).map(String::as_str)
    }
}

/// The state every handler and the resolver read and mutate.
///
/// One context is built per run (and per test); nothing is global.
#[derive(Debug, Default)]
pub struct TypeContext {
    pub aliases: AliasRegistry,
    pub known: KnownTypes,
    hidden: HashSet<String>,
}

impl TypeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose resolver maps `hidden` type names to the opaque
    /// pointer.
    pub fn with_hidden_types<I, S>(hidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hidden: hidden.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(name)
    }
}
