//! # Split
//!
//! Projects a live [`Blueprint`] back onto its two documents. Content that was
//! instantiated from an external link belongs to the linked model and is left
//! out of both; the ports of a linked group stay, since routes outside the
//! group attach to them.

use super::documents::{
    BehavioralDoc, BehavioralNode, BusSpec, BusVisual, ConnectionSpec, EndpointSpec, NodeKindTag,
    PinSpec, PinVisual, PortSpec, PortVisual, VisualDoc, VisualNode, WireSpec,
};
use super::Blueprint;
use crate::model::{Endpoint, Graph, Node, NodeId, NodeKind, Route};
use crate::resolver::legality;

pub fn split(blueprint: &Blueprint) -> (BehavioralDoc, VisualDoc) {
    let graph = &blueprint.graph;
    let root = graph.root();

    let mut connections = Vec::new();
    let mut wires = Vec::new();
    for route in graph.routes() {
        if let Some(connection) = connection_spec(graph, route) {
            connections.push(connection);
            wires.push(WireSpec {
                points: route.wire.clone(),
            });
        }
    }

    let behavioral = BehavioralDoc {
        root: behavioral_node(graph, root),
        connections,
    };
    let visual = VisualDoc {
        root: Some(visual_node(graph, root)),
        wires,
    };

    tracing::info!(
        "[BLUEPRINT] Split '{}' into {} connection(s) and {} wire(s)",
        behavioral.root.name,
        behavioral.connections.len(),
        visual.wires.len()
    );
    (behavioral, visual)
}

/// Children, in order, that belong to this model
fn own_children<'g>(graph: &'g Graph, node: &'g Node) -> impl Iterator<Item = &'g Node> + 'g {
    node.as_group()
        .map(|group| group.children.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(move |id| graph.node(*id))
        .filter(|child| !child.imported)
}

fn behavioral_node(graph: &Graph, id: NodeId) -> BehavioralNode {
    let Some(node) = graph.node(id) else {
        return BehavioralNode::group(id, "");
    };

    match &node.kind {
        NodeKind::Source(source) => {
            let mut spec = BehavioralNode::source(id, node.name.clone(), source.behavior.clone());
            spec.settings = node.settings.clone();
            spec.pins = source
                .pins
                .iter()
                .filter_map(|pin| graph.pin(*pin))
                .map(|pin| PinSpec {
                    name: pin.name.clone(),
                    direction: pin.direction,
                    channel: pin.channel,
                })
                .collect();
            spec
        }
        NodeKind::Group(group) => {
            let mut spec = BehavioralNode::group(id, node.name.clone());
            spec.settings = node.settings.clone();
            spec.link = group.link.as_ref().map(|link| link.location.clone());
            spec.library = group.library.clone();
            spec.ports = group
                .ports
                .iter()
                .filter_map(|port| graph.port(*port))
                .map(|port| PortSpec {
                    name: port.name.clone(),
                    direction: port.direction,
                    channel: port.channel,
                })
                .collect();
            spec.buses = group
                .buses
                .iter()
                .filter_map(|bus| graph.bus(*bus))
                .filter(|bus| !bus.imported)
                .map(|bus| BusSpec {
                    id: bus.id,
                    name: bus.name.clone(),
                    filter: bus.filter.clone(),
                })
                .collect();
            spec.children = own_children(graph, node)
                .map(|child| behavioral_node(graph, child.id))
                .collect();
            spec
        }
    }
}

fn visual_node(graph: &Graph, id: NodeId) -> VisualNode {
    let Some(node) = graph.node(id) else {
        return VisualNode {
            kind: NodeKindTag::Group,
            name: String::new(),
            rect: None,
            view: None,
            pins: Vec::new(),
            ports: Vec::new(),
            buses: Vec::new(),
            children: Vec::new(),
        };
    };

    let mut visual = VisualNode {
        kind: if node.is_group() {
            NodeKindTag::Group
        } else {
            NodeKindTag::Source
        },
        name: node.name.clone(),
        rect: node.rect,
        view: None,
        pins: Vec::new(),
        ports: Vec::new(),
        buses: Vec::new(),
        children: Vec::new(),
    };

    match &node.kind {
        NodeKind::Source(source) => {
            visual.pins = source
                .pins
                .iter()
                .filter_map(|pin| graph.pin(*pin))
                .filter_map(|pin| {
                    pin.label.map(|label| PinVisual {
                        name: pin.name.clone(),
                        direction: pin.direction,
                        label,
                    })
                })
                .collect();
        }
        NodeKind::Group(group) => {
            visual.view = group.view;
            visual.ports = group
                .ports
                .iter()
                .filter_map(|port| graph.port(*port))
                .filter(|port| port.pad_label.is_some() || port.proxy_label.is_some())
                .map(|port| PortVisual {
                    name: port.name.clone(),
                    pad: port.pad_label,
                    proxy: port.proxy_label,
                })
                .collect();
            visual.buses = group
                .buses
                .iter()
                .filter_map(|bus| graph.bus(*bus))
                .filter(|bus| !bus.imported)
                .filter_map(|bus| {
                    bus.rect.map(|rect| BusVisual {
                        name: bus.name.clone(),
                        rect,
                    })
                })
                .collect();
            visual.children = own_children(graph, node)
                .map(|child| visual_node(graph, child.id))
                .collect();
        }
    }
    visual
}

fn endpoint_spec(graph: &Graph, end: Endpoint) -> Option<EndpointSpec> {
    match end {
        Endpoint::Pin(id) => {
            let pin = graph.pin(id)?;
            Some(EndpointSpec::Pin {
                node: pin.node,
                pin: pin.name.clone(),
            })
        }
        Endpoint::Proxy(id) => {
            let port = graph.port(id)?;
            Some(EndpointSpec::Proxy {
                group: port.group,
                port: port.name.clone(),
            })
        }
        Endpoint::Pad(id) => {
            let port = graph.port(id)?;
            Some(EndpointSpec::Pad {
                group: port.group,
                port: port.name.clone(),
            })
        }
        Endpoint::Tack(id) => graph.tack(id).map(|tack| EndpointSpec::Bus { bus: tack.bus }),
    }
}

/// Persisted form of a route, or `None` when the route lives inside linked
/// content
fn connection_spec(graph: &Graph, route: &Route) -> Option<ConnectionSpec> {
    let sender = legality::sender(graph, route.id)?;
    let receiver = route.other(sender)?;

    let scope = graph.scope(sender)?;
    if graph.inside_link(scope) {
        return None;
    }

    Some(ConnectionSpec {
        from: endpoint_spec(graph, sender)?,
        to: endpoint_spec(graph, receiver)?,
    })
}
