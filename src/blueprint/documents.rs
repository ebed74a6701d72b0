//! # Blueprint Documents
//!
//! A blueprint is persisted as two JSON documents:
//!
//! - **behavioral**: node kinds and names, behavior and filter references,
//!   settings, ports, pins, buses and the connection list. Everything that
//!   changes what the compiled program does.
//! - **visual**: rectangles, view transforms, label placement and wire
//!   geometry. Nodes are matched to the behavioral tree by position, and
//!   everything nested inside a node by name.
//!
//! Only `kind` and `name` (plus a pin's direction) appear in both.

use crate::error::LoadError;
use crate::model::{BehaviorRef, BusId, Direction, NodeId, Point, Rect, ViewTransform};
use serde::{Deserialize, Serialize};

type Settings = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKindTag {
    Source,
    Group,
}

// ================================================================================================
// Behavioral document
// ================================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralDoc {
    pub root: BehavioralNode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<ConnectionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralNode {
    pub kind: NodeKindTag,
    pub id: NodeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<BehaviorRef>,
    #[serde(default, skip_serializing_if = "Settings::is_empty")]
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pins: Vec<PinSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buses: Vec<BusSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BehavioralNode>,
    /// Location of the model this group's contents come from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Location override for behaviors inside this group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

impl BehavioralNode {
    pub fn source(id: NodeId, name: impl Into<String>, behavior: BehaviorRef) -> Self {
        Self {
            kind: NodeKindTag::Source,
            id,
            name: name.into(),
            behavior: Some(behavior),
            settings: Settings::new(),
            pins: Vec::new(),
            ports: Vec::new(),
            buses: Vec::new(),
            children: Vec::new(),
            link: None,
            library: None,
        }
    }

    pub fn group(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            kind: NodeKindTag::Group,
            behavior: None,
            ..Self::source(id, name, BehaviorRef::new(""))
        }
    }

    /// Every node id in this subtree, this node first
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.id];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinSpec {
    pub name: String,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub channel: bool,
}

/// A group boundary; `direction` is the direction seen from outside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub channel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSpec {
    pub id: BusId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<BehaviorRef>,
}

/// A persisted route, written sender first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub from: EndpointSpec,
    pub to: EndpointSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EndpointSpec {
    Pin { node: NodeId, pin: String },
    Proxy { group: NodeId, port: String },
    Pad { group: NodeId, port: String },
    Bus { bus: BusId },
}

impl std::fmt::Display for EndpointSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pin { node, pin } => write!(f, "pin '{}' of node {}", pin, node),
            Self::Proxy { group, port } => write!(f, "proxy '{}' of group {}", port, group),
            Self::Pad { group, port } => write!(f, "pad '{}' of group {}", port, group),
            Self::Bus { bus } => write!(f, "bus {}", bus),
        }
    }
}

// ================================================================================================
// Visual document
// ================================================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualDoc {
    #[serde(default)]
    pub root: Option<VisualNode>,
    /// One entry per connection, in connection order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wires: Vec<WireSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
    pub kind: NodeKindTag,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewTransform>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pins: Vec<PinVisual>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortVisual>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buses: Vec<BusVisual>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VisualNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinVisual {
    pub name: String,
    pub direction: Direction,
    pub label: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortVisual {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pad: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusVisual {
    pub name: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireSpec {
    #[serde(default)]
    pub points: Vec<Point>,
}

// ================================================================================================
// JSON
// ================================================================================================

impl BehavioralDoc {
    /// Parse a behavioral document. Failure makes the model unusable.
    pub fn from_json(location: &str, text: &str) -> Result<Self, LoadError> {
        let doc: Self =
            serde_json::from_str(text).map_err(|err| LoadError::BehavioralLoadFailure {
                location: location.to_string(),
                reason: err.to_string(),
            })?;
        if doc.root.kind != NodeKindTag::Group {
            return Err(LoadError::BehavioralLoadFailure {
                location: location.to_string(),
                reason: "top-level node must be a group".to_string(),
            });
        }
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Locations of every external link, in tree order, without repeats
    pub fn links(&self) -> Vec<String> {
        fn walk(node: &BehavioralNode, found: &mut Vec<String>) {
            if let Some(link) = &node.link {
                if !found.contains(link) {
                    found.push(link.clone());
                }
            }
            for child in &node.children {
                walk(child, found);
            }
        }
        let mut found = Vec::new();
        walk(&self.root, &mut found);
        found
    }
}

impl VisualDoc {
    pub fn from_json(location: &str, text: &str) -> Result<Self, LoadError> {
        serde_json::from_str(text).map_err(|err| LoadError::VisualLoadFailure {
            location: location.to_string(),
            reason: err.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavioral_json_shape() {
        let text = r#"{
            "root": {
                "kind": "group", "id": 1, "name": "app",
                "children": [
                    { "kind": "source", "id": 2, "name": "X",
                      "behavior": { "identifier": "ticker" },
                      "pins": [ { "name": "go", "direction": "output" } ] }
                ],
                "buses": [ { "id": 3, "name": "bus" } ]
            },
            "connections": [
                { "from": { "type": "pin", "node": 2, "pin": "go" },
                  "to": { "type": "bus", "bus": 3 } }
            ]
        }"#;
        let doc = BehavioralDoc::from_json("app", text).unwrap();
        assert_eq!(doc.root.children[0].pins[0].direction, Direction::Output);
        assert_eq!(doc.connections[0].to, EndpointSpec::Bus { bus: BusId(3) });
        assert_eq!(doc.root.ids(), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_source_root_is_a_behavioral_failure() {
        let text = r#"{ "root": { "kind": "source", "id": 1, "name": "lonely" } }"#;
        assert!(matches!(
            BehavioralDoc::from_json("lonely", text),
            Err(LoadError::BehavioralLoadFailure { .. })
        ));
    }

    #[test]
    fn test_malformed_visual_is_a_visual_failure() {
        assert!(matches!(
            VisualDoc::from_json("app", "[1, 2"),
            Err(LoadError::VisualLoadFailure { .. })
        ));
        let empty = VisualDoc::from_json("app", "{}").unwrap();
        assert!(empty.root.is_none());
    }

    #[test]
    fn test_links_are_unique_in_tree_order() {
        let mut root = BehavioralNode::group(NodeId(1), "app");
        let mut a = BehavioralNode::group(NodeId(2), "A");
        a.link = Some("lib/a".to_string());
        let mut b = BehavioralNode::group(NodeId(3), "B");
        b.link = Some("lib/b".to_string());
        let mut again = BehavioralNode::group(NodeId(4), "A2");
        again.link = Some("lib/a".to_string());
        root.children = vec![a, b, again];

        let doc = BehavioralDoc {
            root,
            connections: Vec::new(),
        };
        assert_eq!(doc.links(), vec!["lib/a", "lib/b"]);
    }
}
