//! # Blueprint
//!
//! A live model: the [`Graph`], the [`Resolver`] tables kept in step with it,
//! and the diagnostics gathered while loading it. Blueprints are persisted as
//! a [`BehavioralDoc`] plus a [`VisualDoc`]; [`join`]
//! builds a blueprint from the pair and [`split`] projects it back.

mod documents;
mod join;
mod layout;
mod split;

pub use documents::{
    BehavioralDoc, BehavioralNode, BusSpec, BusVisual, ConnectionSpec, EndpointSpec, NodeKindTag,
    PinSpec, PinVisual, PortSpec, PortVisual, VisualDoc, VisualNode, WireSpec,
};
pub use join::join;
pub use layout::{bus_slot, node_slot};
pub use split::split;

use crate::compiler::{self, Compilation};
use crate::config::{CompilerOptions, LayoutOptions};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{ConnectError, GraphError, LoadError};
use crate::model::{Endpoint, Graph, LinkState, NodeId, RouteId, Target, Terminal};
use crate::resolver::{self, Resolver};
use serde::{Deserialize, Serialize};

/// How much of the stored geometry survived loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutFidelity {
    /// Every element was placed from the visual document
    #[default]
    Full,
    /// Some or all geometry was synthesized
    Reduced,
}

#[derive(Debug, Clone)]
pub struct Blueprint {
    pub(crate) graph: Graph,
    pub(crate) resolver: Resolver,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) layout: LayoutFidelity,
}

impl Blueprint {
    /// An empty model with only its top-level group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(name),
            resolver: Resolver::new(),
            diagnostics: Diagnostics::new(),
            layout: LayoutFidelity::Full,
        }
    }

    /// Parse and join a document pair.
    ///
    /// A behavioral failure is fatal. A missing or unreadable visual document
    /// only costs layout fidelity.
    pub fn load(
        location: &str,
        behavioral: &str,
        visual: Option<&str>,
        options: &LayoutOptions,
    ) -> Result<Self, LoadError> {
        let behavioral = BehavioralDoc::from_json(location, behavioral)?;

        let mut early = Diagnostics::new();
        let visual = match visual.map(|text| VisualDoc::from_json(location, text)) {
            Some(Ok(doc)) => Some(doc),
            Some(Err(err)) => {
                early.warn(DiagnosticKind::VisualLoadFailure, None, err.to_string());
                None
            }
            None => None,
        };

        let mut blueprint = join(&behavioral, visual.as_ref(), options)?;
        early.extend(std::mem::take(&mut blueprint.diagnostics));
        blueprint.diagnostics = early;
        Ok(blueprint)
    }

    /// Serialize both documents
    pub fn save(&self) -> Result<(String, String), LoadError> {
        let (behavioral, visual) = split(self);
        Ok((behavioral.to_json()?, visual.to_json()?))
    }

    pub fn name(&self) -> &str {
        self.graph
            .node(self.graph.root())
            .map(|root| root.name.as_str())
            .unwrap_or_default()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Structural edits. Routes can only be changed through
    /// [`connect`](Self::connect) and [`disconnect`](Self::disconnect).
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn layout_fidelity(&self) -> LayoutFidelity {
        self.layout
    }

    pub fn connect(
        &mut self,
        a: impl Into<Terminal>,
        b: impl Into<Terminal>,
    ) -> Result<RouteId, ConnectError> {
        self.resolver.connect(&mut self.graph, a.into(), b.into())
    }

    pub fn disconnect(&mut self, route: RouteId) -> bool {
        self.resolver.disconnect(&mut self.graph, route)
    }

    /// Current table of an origin
    pub fn destinations(&self, origin: Endpoint) -> &[Target] {
        self.resolver.destinations(origin)
    }

    /// Recompute an origin's destinations from the graph
    pub fn resolve(&self, origin: Endpoint) -> Vec<Target> {
        resolver::resolve(&self.graph, origin)
    }

    /// Remove a node, its contents and every route touching them
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.graph.require_node(node)?;
        if node == self.graph.root() {
            return Err(GraphError::RootExists(node));
        }
        for route in self.graph.routes_within(node) {
            self.resolver.disconnect(&mut self.graph, route);
        }
        self.graph.remove_subtree(node)?;
        self.resolver.prune(&self.graph);
        Ok(())
    }

    /// Instantiate a loaded model into a linked group
    pub fn expand_link(&mut self, group: NodeId, linked: &Blueprint) -> Result<(), GraphError> {
        self.graph.instantiate(group, &linked.graph)?;
        self.graph.set_link_state(group, LinkState::Expanded)?;
        self.resolver.rebuild(&self.graph);
        tracing::info!(
            "[BLUEPRINT] Expanded '{}' into group {}",
            linked.name(),
            group
        );
        Ok(())
    }

    /// Record that a linked group's model could not be loaded
    pub fn mark_link_broken(&mut self, group: NodeId, reason: impl Into<String>) -> Result<(), GraphError> {
        let reason = reason.into();
        tracing::warn!("[BLUEPRINT] Link of group {} is broken: {}", group, reason);
        self.graph.set_link_state(group, LinkState::Broken(reason))
    }

    /// Linked groups still waiting for their model, with the location of each
    pub fn pending_links(&self) -> Vec<(NodeId, String)> {
        self.graph
            .nodes()
            .filter_map(|node| {
                let link = node.as_group()?.link.as_ref()?;
                (link.state == LinkState::Pending).then(|| (node.id, link.location.clone()))
            })
            .collect()
    }

    pub fn split(&self) -> (BehavioralDoc, VisualDoc) {
        split(self)
    }

    pub fn compile(&self, options: &CompilerOptions) -> Compilation {
        compiler::compile_blueprint(self, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BehaviorRef, Direction, Point, Rect};

    fn sample() -> (BehavioralDoc, VisualDoc) {
        let mut blueprint = Blueprint::new("app");
        let root = blueprint.graph().root();
        let graph = blueprint.graph_mut();
        let x = graph.add_source(root, "X", BehaviorRef::new("ticker")).unwrap();
        let go = graph.add_pin(x, "go", Direction::Output, false).unwrap();
        let g = graph.add_group(root, "G").unwrap();
        let port = graph.add_port(g, "go", Direction::Input, false).unwrap();
        let y = graph.add_source(g, "Y", BehaviorRef::at("sink", "lib/")).unwrap();
        let sink = graph.add_pin(y, "go", Direction::Input, false).unwrap();
        let bus = graph.add_bus(root, "bus", None).unwrap();

        for (node, slot) in [(x, 0), (g, 1), (y, 0)] {
            graph
                .set_node_rect(node, Some(Rect::new(slot as f64 * 100.0, 0.0, 80.0, 40.0)))
                .unwrap();
        }
        graph
            .set_bus_rect(bus, Some(Rect::new(0.0, 200.0, 300.0, 10.0)))
            .unwrap();
        graph.set_pin_label(go, Some(Point::new(1.0, 2.0))).unwrap();

        blueprint.connect(go, bus).unwrap();
        blueprint.connect(bus, Terminal::Pad(port)).unwrap();
        let inner = blueprint.connect(Terminal::Proxy(port), sink).unwrap();
        blueprint
            .graph_mut()
            .set_route_wire(inner, vec![Point::new(5.0, 5.0), Point::new(9.0, 5.0)])
            .unwrap();
        blueprint.split()
    }

    #[test]
    fn test_split_join_roundtrip() {
        let (behavioral, visual) = sample();
        let joined = join(&behavioral, Some(&visual), &LayoutOptions::default()).unwrap();
        assert_eq!(joined.layout_fidelity(), LayoutFidelity::Full);
        assert!(joined.diagnostics().is_empty());
        assert_eq!(joined.split(), (behavioral, visual));
    }

    #[test]
    fn test_missing_visual_synthesizes_layout() {
        let (behavioral, _) = sample();
        let joined = join(&behavioral, None, &LayoutOptions::default()).unwrap();
        assert_eq!(joined.layout_fidelity(), LayoutFidelity::Reduced);
        assert!(joined.diagnostics().has(DiagnosticKind::ReducedLayoutFidelity));
        assert!(joined.graph().nodes().filter(|n| n.parent.is_some()).all(|n| n.rect.is_some()));
        assert_eq!(joined.graph().route_count(), 3);
    }

    #[test]
    fn test_unreadable_visual_is_not_fatal() {
        let (behavioral, _) = sample();
        let text = behavioral.to_json().unwrap();
        let loaded = Blueprint::load("app", &text, Some("{ nope"), &LayoutOptions::default()).unwrap();
        assert!(loaded.diagnostics().has(DiagnosticKind::VisualLoadFailure));
        assert_eq!(loaded.layout_fidelity(), LayoutFidelity::Reduced);
    }

    #[test]
    fn test_dangling_connection_is_dropped() {
        let (mut behavioral, visual) = sample();
        behavioral.connections.push(ConnectionSpec {
            from: EndpointSpec::Pin {
                node: NodeId(999),
                pin: "go".to_string(),
            },
            to: EndpointSpec::Bus {
                bus: behavioral.root.buses[0].id,
            },
        });
        let joined = join(&behavioral, Some(&visual), &LayoutOptions::default()).unwrap();
        assert!(joined.diagnostics().has(DiagnosticKind::UnresolvedEndpoint));
        assert_eq!(joined.graph().route_count(), 3);
    }

    #[test]
    fn test_remove_node_clears_tables() {
        let mut blueprint = Blueprint::new("app");
        let root = blueprint.graph().root();
        let graph = blueprint.graph_mut();
        let x = graph.add_source(root, "X", BehaviorRef::new("x")).unwrap();
        let y = graph.add_source(root, "Y", BehaviorRef::new("y")).unwrap();
        let out = graph.add_pin(x, "go", Direction::Output, false).unwrap();
        let input = graph.add_pin(y, "go", Direction::Input, false).unwrap();
        blueprint.connect(out, input).unwrap();

        blueprint.remove_node(y).unwrap();
        assert!(blueprint.destinations(Endpoint::Pin(out)).is_empty());
        assert_eq!(blueprint.graph().route_count(), 0);
        assert!(blueprint.remove_node(root).is_err());
    }
}
