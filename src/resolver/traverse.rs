//! # Route Traversal
//!
//! Downstream resolution from an origin to its concrete destinations, and the
//! reverse search used to find which origins a route change can affect.
//!
//! An *origin* is an endpoint that owns a destination table: an output pin on
//! a Source node, or an outgoing tack of a filtered bus (the filter forwards
//! from there at runtime).

use crate::model::{Direction, Endpoint, Graph, Target, TargetKey, TargetOwner, TackFlow};
use crate::multi;
use std::collections::HashSet;

/// Whether `end` owns a destination table
pub fn is_origin(graph: &Graph, end: Endpoint) -> bool {
    match end {
        Endpoint::Pin(id) => graph
            .pin(id)
            .map(|pin| pin.direction == Direction::Output)
            .unwrap_or(false),
        Endpoint::Tack(id) => graph
            .tack(id)
            .filter(|tack| tack.flow == TackFlow::Outgoing)
            .and_then(|tack| graph.bus(tack.bus))
            .map(|bus| bus.is_filtered())
            .unwrap_or(false),
        Endpoint::Proxy(_) | Endpoint::Pad(_) => false,
    }
}

/// Every origin in the graph, pins before filter tacks, each in id order
pub fn origins(graph: &Graph) -> Vec<Endpoint> {
    let pins = graph
        .pins()
        .filter(|pin| pin.direction == Direction::Output)
        .map(|pin| Endpoint::Pin(pin.id));
    let tacks = graph
        .tacks()
        .map(|tack| Endpoint::Tack(tack.id))
        .filter(|end| is_origin(graph, *end));
    pins.chain(tacks).collect()
}

/// Structural identity of a target
pub fn target_key(graph: &Graph, target: &Target) -> Option<TargetKey> {
    match *target {
        Target::Pin { node, pin } => Some(TargetKey {
            owner: TargetOwner::Node(node),
            name: graph.pin(pin)?.name.clone(),
        }),
        Target::Tack { bus, tack } => Some(TargetKey {
            owner: TargetOwner::Bus(bus),
            name: graph.tack(tack)?.message.clone(),
        }),
        Target::Boundary { group, port } => Some(TargetKey {
            owner: TargetOwner::Node(group),
            name: graph.port(port)?.name.clone(),
        }),
    }
}

/// Resolve every concrete destination reachable from `origin`.
///
/// Boundaries are passed through, unfiltered buses fan out to the outgoing
/// tacks whose message overlaps the origin's, and filtered buses stop
/// resolution at the tack. When the origin or a candidate pin is a
/// multi-message name, the two must overlap. Results are unique by
/// [`TargetKey`] and in first-reached order.
pub fn resolve(graph: &Graph, origin: Endpoint) -> Vec<Target> {
    let source = graph.name(origin).unwrap_or_default();
    let mut walk = Downstream {
        graph,
        source,
        visited: HashSet::new(),
        keys: HashSet::new(),
        found: Vec::new(),
    };
    walk.visited.insert(origin);
    walk.follow(origin);

    tracing::debug!(
        "[RESOLVER] {} '{}' resolves to {} destination(s)",
        origin,
        source,
        walk.found.len()
    );
    walk.found
}

struct Downstream<'a> {
    graph: &'a Graph,
    source: &'a str,
    visited: HashSet<Endpoint>,
    keys: HashSet<TargetKey>,
    found: Vec<Target>,
}

impl<'a> Downstream<'a> {
    fn emit(&mut self, target: Target) {
        if let Some(key) = target_key(self.graph, &target) {
            if self.keys.insert(key) {
                self.found.push(target);
            }
        }
    }

    /// `from` is always in the output role of the routes being followed
    fn follow(&mut self, from: Endpoint) {
        let graph = self.graph;
        for route_id in graph.routes_of(from) {
            let Some(to) = graph.route(*route_id).and_then(|route| route.other(from)) else {
                continue;
            };
            if graph.direction(to) != Some(Direction::Input) {
                continue;
            }

            match to {
                Endpoint::Pin(pin_id) => {
                    let Some(pin) = graph.pin(pin_id) else {
                        continue;
                    };
                    if multi::compatible(self.source, &pin.name) {
                        self.emit(Target::Pin {
                            node: pin.node,
                            pin: pin_id,
                        });
                    }
                }
                Endpoint::Proxy(port_id) => {
                    // leaving the group through an output port
                    let pad = Endpoint::Pad(port_id);
                    if !self.visited.insert(pad) {
                        continue;
                    }
                    let Some(port) = graph.port(port_id) else {
                        continue;
                    };
                    if graph.routes_of(pad).is_empty() && port.group == graph.root() {
                        if multi::compatible(self.source, &port.name) {
                            self.emit(Target::Boundary {
                                group: port.group,
                                port: port_id,
                            });
                        }
                    } else {
                        self.follow(pad);
                    }
                }
                Endpoint::Pad(port_id) => {
                    // entering the group through an input port
                    let proxy = Endpoint::Proxy(port_id);
                    if self.visited.insert(proxy) {
                        self.follow(proxy);
                    }
                }
                Endpoint::Tack(tack_id) => {
                    let Some(bus) = graph.tack(tack_id).and_then(|tack| graph.bus(tack.bus)) else {
                        continue;
                    };
                    if bus.is_filtered() {
                        self.emit(Target::Tack {
                            bus: bus.id,
                            tack: tack_id,
                        });
                        continue;
                    }
                    if !self.visited.insert(to) {
                        continue;
                    }
                    for other in &bus.tacks {
                        // only tacks carrying a message the source can send
                        let carries = graph
                            .tack(*other)
                            .map(|tack| {
                                tack.flow == TackFlow::Outgoing
                                    && multi::overlap(self.source, &tack.message)
                            })
                            .unwrap_or(false);
                        let candidate = Endpoint::Tack(*other);
                        if *other != tack_id && carries && self.visited.insert(candidate) {
                            self.follow(candidate);
                        }
                    }
                }
            }
        }
    }
}

/// Origins whose resolution passes through `sender`, an endpoint in the
/// output role of some route
pub fn upstream_origins(graph: &Graph, sender: Endpoint) -> Vec<Endpoint> {
    let mut walk = Upstream {
        graph,
        visited: HashSet::new(),
        origins: Vec::new(),
    };
    walk.climb(sender);
    walk.origins
}

struct Upstream<'a> {
    graph: &'a Graph,
    visited: HashSet<Endpoint>,
    origins: Vec<Endpoint>,
}

impl<'a> Upstream<'a> {
    fn climb(&mut self, at: Endpoint) {
        if !self.visited.insert(at) {
            return;
        }
        let graph = self.graph;
        if is_origin(graph, at) {
            self.origins.push(at);
            return;
        }

        match at {
            Endpoint::Pin(_) => {}
            // an input port's proxy is fed by whatever reaches its pad
            Endpoint::Proxy(port) => self.climb_routes(Endpoint::Pad(port)),
            // an output port's pad is fed by whatever reaches its proxy
            Endpoint::Pad(port) => self.climb_routes(Endpoint::Proxy(port)),
            Endpoint::Tack(tack_id) => {
                let Some(bus) = graph.tack(tack_id).and_then(|tack| graph.bus(tack.bus)) else {
                    return;
                };
                for other in &bus.tacks {
                    let incoming = graph
                        .tack(*other)
                        .map(|tack| tack.flow == TackFlow::Incoming)
                        .unwrap_or(false);
                    if incoming {
                        self.climb_routes(Endpoint::Tack(*other));
                    }
                }
            }
        }
    }

    /// Climb every route feeding the input-role endpoint `end`
    fn climb_routes(&mut self, end: Endpoint) {
        let graph = self.graph;
        for route_id in graph.routes_of(end) {
            let Some(from) = graph.route(*route_id).and_then(|route| route.other(end)) else {
                continue;
            };
            if graph.direction(from) == Some(Direction::Output) {
                self.climb(from);
            }
        }
    }
}
