//! # Nodes
//!
//! A node is either a `Source`, which runs a named behavior, or a `Group`,
//! which contains child nodes, buses and the ports forming its boundary.

use super::geometry::{Rect, ViewTransform};
use super::ids::{BusId, NodeId, PinId, PortId};
use serde::{Deserialize, Serialize};

/// Reference to a behavior implementation: an identifier plus, optionally,
/// the source location it must be imported from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BehaviorRef {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl BehaviorRef {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            location: None,
        }
    }

    pub fn at(identifier: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            location: Some(location.into()),
        }
    }
}

/// Load state of a group's external link
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Not loaded yet
    #[default]
    Pending,
    /// Linked contents were instantiated into the group
    Expanded,
    /// The linked model could not be loaded
    Broken(String),
}

/// A group whose contents live in another model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    pub location: String,
    pub state: LinkState,
}

impl ExternalLink {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            state: LinkState::Pending,
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self.state, LinkState::Broken(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    pub behavior: BehaviorRef,
    pub pins: Vec<PinId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupNode {
    pub children: Vec<NodeId>,
    pub buses: Vec<BusId>,
    pub ports: Vec<PortId>,
    pub link: Option<ExternalLink>,
    /// Source location applied to every behavior inside this group that
    /// does not name its own
    pub library: Option<String>,
    pub view: Option<ViewTransform>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Source(SourceNode),
    Group(GroupNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Display label; not unique
    pub name: String,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub settings: serde_json::Map<String, serde_json::Value>,
    pub rect: Option<Rect>,
    /// Instantiated from an external link; never persisted by the owner
    pub imported: bool,
}

impl Node {
    pub fn as_source(&self) -> Option<&SourceNode> {
        match &self.kind {
            NodeKind::Source(source) => Some(source),
            NodeKind::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupNode> {
        match &self.kind {
            NodeKind::Group(group) => Some(group),
            NodeKind::Source(_) => None,
        }
    }

    pub(crate) fn as_source_mut(&mut self) -> Option<&mut SourceNode> {
        match &mut self.kind {
            NodeKind::Source(source) => Some(source),
            NodeKind::Group(_) => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut GroupNode> {
        match &mut self.kind {
            NodeKind::Group(group) => Some(group),
            NodeKind::Source(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Source(_) => "source",
            NodeKind::Group(_) => "group",
        }
    }
}
