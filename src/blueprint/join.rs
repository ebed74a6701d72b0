//! # Join
//!
//! Builds a live [`Blueprint`] from a behavioral document and, when there is
//! one, its visual document. Malformed elements are skipped with a
//! diagnostic; only an unusable top-level node stops the load.

use super::documents::{
    BehavioralDoc, BehavioralNode, EndpointSpec, NodeKindTag, VisualDoc, VisualNode,
};
use super::layout;
use super::{Blueprint, LayoutFidelity};
use crate::config::LayoutOptions;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{GraphError, LoadError};
use crate::model::{Direction, Graph, NodeId, Terminal};
use crate::resolver::{legality, Resolver};

/// Merge the two documents into a blueprint
pub fn join(
    behavioral: &BehavioralDoc,
    visual: Option<&VisualDoc>,
    options: &LayoutOptions,
) -> Result<Blueprint, LoadError> {
    let root = &behavioral.root;
    if root.kind != NodeKindTag::Group {
        return Err(LoadError::BehavioralLoadFailure {
            location: root.name.clone(),
            reason: "top-level node must be a group".to_string(),
        });
    }

    tracing::info!(
        "[BLUEPRINT] Joining '{}' ({} connection(s), visual: {})",
        root.name,
        behavioral.connections.len(),
        if visual.is_some() { "yes" } else { "no" }
    );

    let mut graph = Graph::with_root_id(root.id, root.name.clone());
    reserve_ids(&mut graph, root);

    let mut loader = Loader {
        graph,
        diagnostics: Diagnostics::new(),
        options,
        synthesized: 0,
    };

    let visual_root = visual.and_then(|doc| doc.root.as_ref());
    let visual_root = match visual_root {
        Some(node) if node.kind == NodeKindTag::Group && node.name == root.name => Some(node),
        Some(node) => {
            loader.diagnostics.warn(
                DiagnosticKind::StaleVisualEntry,
                Some(root.id.0),
                format!("visual root '{}' does not match '{}'", node.name, root.name),
            );
            None
        }
        None => None,
    };

    let root_id = loader.graph.root();
    loader.fill_group(root, root_id, visual_root);
    loader.connect_all(behavioral, visual);

    let Loader {
        graph,
        mut diagnostics,
        synthesized,
        ..
    } = loader;

    let layout = if synthesized > 0 || visual.is_none() {
        diagnostics.warn(
            DiagnosticKind::ReducedLayoutFidelity,
            Some(root.id.0),
            format!("placed {} element(s) automatically", synthesized),
        );
        LayoutFidelity::Reduced
    } else {
        LayoutFidelity::Full
    };

    let resolver = Resolver::build(&graph);
    Ok(Blueprint {
        graph,
        resolver,
        diagnostics,
        layout,
    })
}

fn reserve_ids(graph: &mut Graph, node: &BehavioralNode) {
    graph.reserve_id(node.id.0);
    for bus in &node.buses {
        graph.reserve_id(bus.id.0);
    }
    for child in &node.children {
        reserve_ids(graph, child);
    }
}

struct Loader<'a> {
    graph: Graph,
    diagnostics: Diagnostics,
    options: &'a LayoutOptions,
    synthesized: usize,
}

impl<'a> Loader<'a> {
    fn skip(&mut self, subject: NodeId, message: String) {
        self.diagnostics
            .warn(DiagnosticKind::SkippedEntity, Some(subject.0), message);
    }

    /// Report a setter that failed on an element already in the graph
    fn check(&mut self, subject: NodeId, what: impl std::fmt::Display, result: Result<(), GraphError>) {
        if let Err(err) = result {
            self.skip(subject, format!("{}: {}", what, err));
        }
    }

    fn stale(&mut self, subject: NodeId, message: String) {
        self.diagnostics
            .warn(DiagnosticKind::StaleVisualEntry, Some(subject.0), message);
    }

    fn fill_group(&mut self, spec: &BehavioralNode, id: NodeId, visual: Option<&VisualNode>) {
        let result = self.graph.set_settings(id, spec.settings.clone());
        self.check(id, "settings", result);
        let result = self.graph.set_library(id, spec.library.clone());
        self.check(id, "library", result);
        if let Some(link) = &spec.link {
            let result = self.graph.set_link(id, link.clone());
            self.check(id, "link", result);
        }
        if let Some(visual) = visual {
            let result = self.graph.set_node_rect(id, visual.rect);
            self.check(id, "rect", result);
            let result = self.graph.set_group_view(id, visual.view);
            self.check(id, "view", result);
        }

        for port in &spec.ports {
            let port_id = match self.graph.add_port(id, port.name.clone(), port.direction, port.channel)
            {
                Ok(port_id) => port_id,
                Err(err) => {
                    self.skip(id, format!("port '{}': {}", port.name, err));
                    continue;
                }
            };
            if let Some(placed) = visual.and_then(|v| v.ports.iter().find(|p| p.name == port.name)) {
                let result = self.graph.set_port_labels(port_id, placed.pad, placed.proxy);
                self.check(id, format!("port '{}' labels", port.name), result);
            }
        }
        if let Some(visual) = visual {
            for placed in &visual.ports {
                if !spec.ports.iter().any(|port| port.name == placed.name) {
                    self.stale(id, format!("port '{}'", placed.name));
                }
            }
        }

        let mut claimed = vec![false; visual.map(|v| v.buses.len()).unwrap_or(0)];
        for (index, bus) in spec.buses.iter().enumerate() {
            let bus_id = match self
                .graph
                .add_bus_as(Some(bus.id), id, bus.name.clone(), bus.filter.clone())
            {
                Ok(bus_id) => bus_id,
                Err(err) => {
                    self.skip(id, format!("bus '{}': {}", bus.name, err));
                    continue;
                }
            };

            let placed = visual.and_then(|v| {
                v.buses
                    .iter()
                    .enumerate()
                    .find(|(i, placed)| !claimed[*i] && placed.name == bus.name)
            });
            let rect = match placed {
                Some((i, placed)) => {
                    claimed[i] = true;
                    placed.rect
                }
                None => {
                    self.synthesized += 1;
                    layout::bus_slot(self.options, spec.children.len(), index)
                }
            };
            let result = self.graph.set_bus_rect(bus_id, Some(rect));
            self.check(id, format!("bus '{}' rect", bus.name), result);
        }
        if let Some(visual) = visual {
            for (i, placed) in visual.buses.iter().enumerate() {
                if !claimed[i] {
                    self.stale(id, format!("bus '{}'", placed.name));
                }
            }
        }

        for (index, child) in spec.children.iter().enumerate() {
            let placed = match visual.and_then(|v| v.children.get(index)) {
                Some(placed) if placed.kind == child.kind && placed.name == child.name => Some(placed),
                Some(placed) => {
                    self.stale(
                        id,
                        format!("child {} is '{}' visually, '{}' behaviorally", index, placed.name, child.name),
                    );
                    None
                }
                None => None,
            };
            self.fill_child(child, id, index, placed);
        }
        if let Some(visual) = visual {
            for extra in visual.children.iter().skip(spec.children.len()) {
                self.stale(id, format!("child '{}'", extra.name));
            }
        }
    }

    fn fill_child(
        &mut self,
        spec: &BehavioralNode,
        parent: NodeId,
        index: usize,
        visual: Option<&VisualNode>,
    ) {
        let added = match spec.kind {
            NodeKindTag::Source => {
                let Some(behavior) = spec.behavior.clone() else {
                    self.skip(spec.id, format!("source '{}' has no behavior", spec.name));
                    return;
                };
                self.graph
                    .add_source_as(Some(spec.id), parent, spec.name.clone(), behavior)
            }
            NodeKindTag::Group => self.graph.add_group_as(Some(spec.id), parent, spec.name.clone()),
        };
        let id = match added {
            Ok(id) => id,
            Err(err) => {
                self.skip(spec.id, format!("node '{}': {}", spec.name, err));
                return;
            }
        };

        let rect = match visual.and_then(|v| v.rect) {
            Some(rect) => rect,
            None => {
                self.synthesized += 1;
                layout::node_slot(self.options, index)
            }
        };
        let result = self.graph.set_node_rect(id, Some(rect));
        self.check(id, "rect", result);

        match spec.kind {
            NodeKindTag::Group => self.fill_group(spec, id, visual),
            NodeKindTag::Source => {
                let result = self.graph.set_settings(id, spec.settings.clone());
                self.check(id, "settings", result);
                for pin in &spec.pins {
                    let pin_id =
                        match self
                            .graph
                            .add_pin(id, pin.name.clone(), pin.direction, pin.channel)
                        {
                            Ok(pin_id) => pin_id,
                            Err(err) => {
                                self.skip(id, format!("pin '{}': {}", pin.name, err));
                                continue;
                            }
                        };
                    let label = visual.and_then(|v| {
                        v.pins
                            .iter()
                            .find(|p| p.name == pin.name && p.direction == pin.direction)
                    });
                    if let Some(label) = label {
                        let result = self.graph.set_pin_label(pin_id, Some(label.label));
                        self.check(id, format!("pin '{}' label", pin.name), result);
                    }
                }
                if let Some(visual) = visual {
                    for label in &visual.pins {
                        let known = spec
                            .pins
                            .iter()
                            .any(|p| p.name == label.name && p.direction == label.direction);
                        if !known {
                            self.stale(id, format!("pin label '{}'", label.name));
                        }
                    }
                }
            }
        }
    }

    fn terminal(&self, spec: &EndpointSpec, role: Direction) -> Option<Terminal> {
        match spec {
            EndpointSpec::Pin { node, pin } => {
                self.graph.find_pin(*node, pin, role).map(Terminal::Pin)
            }
            EndpointSpec::Proxy { group, port } => {
                self.graph.find_port(*group, port).map(Terminal::Proxy)
            }
            EndpointSpec::Pad { group, port } => {
                self.graph.find_port(*group, port).map(Terminal::Pad)
            }
            EndpointSpec::Bus { bus } => self.graph.bus(*bus).map(|_| Terminal::Bus(*bus)),
        }
    }

    fn connect_all(&mut self, behavioral: &BehavioralDoc, visual: Option<&VisualDoc>) {
        let root = self.graph.root().0;
        for (index, connection) in behavioral.connections.iter().enumerate() {
            let from = self.terminal(&connection.from, Direction::Output);
            let to = self.terminal(&connection.to, Direction::Input);
            let (Some(from), Some(to)) = (from, to) else {
                self.diagnostics.warn(
                    DiagnosticKind::UnresolvedEndpoint,
                    Some(root),
                    format!(
                        "connection {} from {} to {} dropped",
                        index, connection.from, connection.to
                    ),
                );
                continue;
            };

            if let Err(err) = legality::check(&self.graph, from, to) {
                self.diagnostics.warn(
                    DiagnosticKind::RejectedConnection,
                    Some(root),
                    format!("connection {} dropped: {}", index, err),
                );
                continue;
            }
            if legality::existing_route(&self.graph, from, to).is_some() {
                self.diagnostics.warn(
                    DiagnosticKind::RejectedConnection,
                    Some(root),
                    format!("connection {} repeats an earlier one", index),
                );
                continue;
            }

            let route = match self.graph.attach(from, to) {
                Ok(route) => route,
                Err(err) => {
                    self.diagnostics.warn(
                        DiagnosticKind::UnresolvedEndpoint,
                        Some(root),
                        format!("connection {} dropped: {}", index, err),
                    );
                    continue;
                }
            };
            if let Some(wire) = visual.and_then(|doc| doc.wires.get(index)) {
                let result = self.graph.set_route_wire(route, wire.points.clone());
                self.check(NodeId(root), format!("connection {} wire", index), result);
            }
        }
    }
}
