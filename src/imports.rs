//! # Import Manifest
//!
//! Collects the behavior references used by a compiled program (Source
//! behaviors and bus filters) and groups them by source location.
//!
//! ## Locations
//!
//! A reference is imported from the first location found in this order:
//!
//! 1. the location written on the reference itself
//! 2. the `library` of the nearest enclosing group that has one
//! 3. [`CompilerOptions::default_location`](crate::config::CompilerOptions)
//!
//! ## Aliases
//!
//! Every import gets a binding name. The first reference to an identifier
//! binds it under its own name. A later reference to the same identifier at a
//! *different* location is bound to `{identifier}{separator}{n}` with the
//! smallest `n >= 1` not already taken, and a
//! [`DuplicateBehaviorIdentifier`](crate::diagnostics::DiagnosticKind) is
//! recorded. The same (identifier, location) pair always reuses its binding.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::model::{BehaviorRef, Graph, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportItem {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ImportItem {
    /// Name the program refers to this behavior by
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSection {
    pub location: String,
    pub items: Vec<ImportItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportManifest {
    sections: Vec<ImportSection>,
    #[serde(skip)]
    separator: String,
    #[serde(skip)]
    bindings: HashMap<(String, String), String>,
    /// First location each identifier was imported from
    #[serde(skip)]
    first_seen: HashMap<String, String>,
    #[serde(skip)]
    taken: HashSet<String>,
}

impl ImportManifest {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            ..Self::default()
        }
    }

    /// Sections in order of each location's first use
    pub fn sections(&self) -> &[ImportSection] {
        &self.sections
    }

    /// Number of imported behaviors
    pub fn len(&self) -> usize {
        self.sections.iter().map(|section| section.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Import `identifier` from `location` and return its binding name
    pub fn add(
        &mut self,
        identifier: &str,
        location: &str,
        subject: Option<NodeId>,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let key = (identifier.to_string(), location.to_string());
        if let Some(binding) = self.bindings.get(&key) {
            return binding.clone();
        }

        let alias = if self.taken.contains(identifier) {
            let alias = self.next_alias(identifier);
            let claimed_at = self
                .first_seen
                .get(identifier)
                .map(String::as_str)
                .unwrap_or("another binding");
            diagnostics.warn(
                DiagnosticKind::DuplicateBehaviorIdentifier,
                subject.map(u32::from),
                format!(
                    "'{}' from '{}' is already imported from '{}'; bound as '{}'",
                    identifier, location, claimed_at, alias
                ),
            );
            Some(alias)
        } else {
            None
        };

        let item = ImportItem {
            identifier: identifier.to_string(),
            alias,
        };
        let binding = item.binding().to_string();
        tracing::debug!("[IMPORTS] {} from '{}' as '{}'", identifier, location, binding);

        self.taken.insert(binding.clone());
        self.first_seen
            .entry(identifier.to_string())
            .or_insert_with(|| location.to_string());
        self.bindings.insert(key, binding.clone());

        match self
            .sections
            .iter_mut()
            .find(|section| section.location == location)
        {
            Some(section) => section.items.push(item),
            None => self.sections.push(ImportSection {
                location: location.to_string(),
                items: vec![item],
            }),
        }
        binding
    }

    fn next_alias(&self, identifier: &str) -> String {
        let mut ordinal = 1usize;
        loop {
            let candidate = format!("{}{}{}", identifier, self.separator, ordinal);
            if !self.taken.contains(&candidate) {
                return candidate;
            }
            ordinal += 1;
        }
    }
}

/// Location `reference`, used by `node`, is imported from
pub fn location_for<'a>(
    graph: &'a Graph,
    node: NodeId,
    reference: &'a BehaviorRef,
    default_location: &'a str,
) -> &'a str {
    if let Some(location) = reference.location.as_deref() {
        return location;
    }
    graph
        .lineage(node)
        .into_iter()
        .filter_map(move |id| graph.node(id)?.as_group()?.library.as_deref())
        .next()
        .unwrap_or(default_location)
}
