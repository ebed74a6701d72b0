//! # Program Descriptors
//!
//! Plain data describing a compiled program: one [`NodeDescriptor`] per Source
//! node and one [`FilterDescriptor`] per filtered bus, both with their output
//! rows fully resolved.
//!
//! Destinations print as `variant @ ownerName (ownerId)`, where the owner is
//! the receiving Source node, the top-level group for a boundary destination,
//! or the filtered bus for a tack.

use crate::imports::ImportManifest;
use crate::model::{BusId, Graph, NodeId, Target};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledProgram {
    pub name: String,
    pub imports: ImportManifest,
    pub nodes: Vec<NodeDescriptor>,
    pub filters: Vec<FilterDescriptor>,
}

impl CompiledProgram {
    pub fn node(&self, id: NodeId) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn filter(&self, bus: BusId) -> Option<&FilterDescriptor> {
        self.filters.iter().find(|filter| filter.bus == bus)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub id: NodeId,
    /// Binding name from the import manifest
    pub behavior: String,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSpec {
    /// Concrete message name, multi names already expanded
    pub name: String,
    pub channel: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterDescriptor {
    pub name: String,
    pub bus: BusId,
    pub filter: String,
    pub rows: Vec<OutputRow>,
}

/// One concrete message variant and everything it is delivered to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub variant: String,
    pub destinations: Vec<Destination>,
}

impl OutputRow {
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

impl fmt::Display for OutputRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> ", self.variant)?;
        match self.destinations.as_slice() {
            [single] => write!(f, "{}", single),
            many => {
                write!(f, "[")?;
                for (i, destination) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", destination)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Destination {
    pub variant: String,
    pub owner: String,
    pub owner_id: u32,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} ({})", self.variant, self.owner, self.owner_id)
    }
}

impl Destination {
    /// Describe `target` receiving message `variant`
    pub fn describe(graph: &Graph, target: &Target, variant: impl Into<String>) -> Option<Self> {
        let (owner, owner_id) = match *target {
            Target::Pin { node, .. } => (graph.node(node)?.name.clone(), node.0),
            Target::Boundary { group, .. } => (graph.node(group)?.name.clone(), group.0),
            Target::Tack { bus, .. } => (graph.bus(bus)?.name.clone(), bus.0),
        };
        Some(Self {
            variant: variant.into(),
            owner,
            owner_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination(variant: &str, owner: &str, owner_id: u32) -> Destination {
        Destination {
            variant: variant.to_string(),
            owner: owner.to_string(),
            owner_id,
        }
    }

    #[test]
    fn test_row_grammar() {
        let single = OutputRow {
            variant: "go".to_string(),
            destinations: vec![destination("go", "Y", 3)],
        };
        assert_eq!(single.to_string(), "go -> go @ Y (3)");

        let many = OutputRow {
            variant: "go".to_string(),
            destinations: vec![destination("go", "Y", 3), destination("go", "Z", 5)],
        };
        assert_eq!(many.to_string(), "go -> [go @ Y (3), go @ Z (5)]");

        let empty = OutputRow {
            variant: "evt b".to_string(),
            destinations: Vec::new(),
        };
        assert_eq!(empty.to_string(), "evt b -> []");
    }
}
