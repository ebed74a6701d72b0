//! # Graph Arena
//!
//! Every entity lives in an ordered map keyed by its id. Ids are handed out in
//! increasing order, so iterating a map visits entities in creation order and
//! anything derived from that order is reproducible.
//!
//! The graph only enforces structural facts (ownership, unique names, pairs of
//! route/endpoint back-references). Connection legality and destination
//! tables belong to the [`Resolver`](crate::resolver::Resolver).

use super::endpoint::{Direction, Endpoint, TackFlow, Terminal};
use super::geometry::{Point, Rect, ViewTransform};
use super::ids::{BusId, IdAllocator, NodeId, PinId, PortId, RouteId, TackId};
use super::node::{BehaviorRef, ExternalLink, GroupNode, LinkState, Node, NodeKind, SourceNode};
use super::wiring::{Bus, Pin, Port, Route, Tack};
use crate::error::{GraphError, Result};
use crate::multi;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    ids: IdAllocator,
    root: NodeId,
    nodes: BTreeMap<NodeId, Node>,
    pins: BTreeMap<PinId, Pin>,
    ports: BTreeMap<PortId, Port>,
    buses: BTreeMap<BusId, Bus>,
    tacks: BTreeMap<TackId, Tack>,
    routes: BTreeMap<RouteId, Route>,
}

impl Graph {
    /// Create a graph with an empty top-level group
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut ids = IdAllocator::new();
        let root = NodeId(ids.next());
        Self::with_root(ids, root, root_name.into())
    }

    /// Create a graph whose top-level group has a known id
    pub fn with_root_id(root: NodeId, root_name: impl Into<String>) -> Self {
        let mut ids = IdAllocator::new();
        ids.reserve(root.0);
        Self::with_root(ids, root, root_name.into())
    }

    fn with_root(ids: IdAllocator, root: NodeId, name: String) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                name,
                parent: None,
                kind: NodeKind::Group(GroupNode::default()),
                settings: serde_json::Map::new(),
                rect: None,
                imported: false,
            },
        );

        Self {
            ids,
            root,
            nodes,
            pins: BTreeMap::new(),
            ports: BTreeMap::new(),
            buses: BTreeMap::new(),
            tacks: BTreeMap::new(),
            routes: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Keep the allocator clear of an id that will be requested explicitly
    pub fn reserve_id(&mut self, id: u32) {
        self.ids.reserve(id);
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.get(&id)
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(&id)
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.get(&id)
    }

    pub fn tack(&self, id: TackId) -> Option<&Tack> {
        self.tacks.get(&id)
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.pins.values()
    }

    pub fn buses(&self) -> impl Iterator<Item = &Bus> {
        self.buses.values()
    }

    pub fn tacks(&self) -> impl Iterator<Item = &Tack> {
        self.tacks.values()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn require_node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn group(&self, id: NodeId) -> Result<&GroupNode> {
        self.require_node(id)?
            .as_group()
            .ok_or(GraphError::NotAGroup(id))
    }

    pub fn source(&self, id: NodeId) -> Result<&SourceNode> {
        self.require_node(id)?
            .as_source()
            .ok_or(GraphError::NotASource(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    fn group_mut(&mut self, id: NodeId) -> Result<&mut GroupNode> {
        self.node_mut(id)?
            .as_group_mut()
            .ok_or(GraphError::NotAGroup(id))
    }

    /// Pin of `node` with this name and direction
    pub fn find_pin(&self, node: NodeId, name: &str, direction: Direction) -> Option<PinId> {
        let source = self.node(node)?.as_source()?;
        source.pins.iter().copied().find(|id| {
            self.pins
                .get(id)
                .map(|pin| pin.name == name && pin.direction == direction)
                .unwrap_or(false)
        })
    }

    pub fn find_port(&self, group: NodeId, name: &str) -> Option<PortId> {
        let group = self.node(group)?.as_group()?;
        group
            .ports
            .iter()
            .copied()
            .find(|id| self.ports.get(id).map(|port| port.name == name).unwrap_or(false))
    }

    /// Routes attached to an endpoint, in attachment order
    pub fn routes_of(&self, end: Endpoint) -> &[RouteId] {
        let routes = match end {
            Endpoint::Pin(id) => self.pins.get(&id).map(|pin| pin.routes.as_slice()),
            Endpoint::Proxy(id) => self.ports.get(&id).map(|port| port.proxy_routes.as_slice()),
            Endpoint::Pad(id) => self.ports.get(&id).map(|port| port.pad_routes.as_slice()),
            Endpoint::Tack(id) => self
                .tacks
                .get(&id)
                .map(|tack| std::slice::from_ref(&tack.route)),
        };
        routes.unwrap_or(&[])
    }

    pub fn contains(&self, end: Endpoint) -> bool {
        match end {
            Endpoint::Pin(id) => self.pins.contains_key(&id),
            Endpoint::Proxy(id) | Endpoint::Pad(id) => self.ports.contains_key(&id),
            Endpoint::Tack(id) => self.tacks.contains_key(&id),
        }
    }

    pub fn direction(&self, end: Endpoint) -> Option<Direction> {
        match end {
            Endpoint::Pin(id) => self.pins.get(&id).map(|pin| pin.direction),
            Endpoint::Proxy(id) => self.ports.get(&id).map(Port::proxy_direction),
            Endpoint::Pad(id) => self.ports.get(&id).map(Port::pad_direction),
            Endpoint::Tack(id) => self.tacks.get(&id).map(|tack| tack.flow.direction()),
        }
    }

    /// Message name carried by an endpoint
    pub fn name(&self, end: Endpoint) -> Option<&str> {
        match end {
            Endpoint::Pin(id) => self.pins.get(&id).map(|pin| pin.name.as_str()),
            Endpoint::Proxy(id) | Endpoint::Pad(id) => {
                self.ports.get(&id).map(|port| port.name.as_str())
            }
            Endpoint::Tack(id) => self.tacks.get(&id).map(|tack| tack.message.as_str()),
        }
    }

    /// Channel flag; tacks carry none
    pub fn channel(&self, end: Endpoint) -> Option<bool> {
        match end {
            Endpoint::Pin(id) => self.pins.get(&id).map(|pin| pin.channel),
            Endpoint::Proxy(id) | Endpoint::Pad(id) => self.ports.get(&id).map(|port| port.channel),
            Endpoint::Tack(_) => None,
        }
    }

    pub fn is_multi(&self, end: Endpoint) -> bool {
        let multi = match end {
            Endpoint::Pin(id) => self.pins.get(&id).map(|pin| pin.multi),
            Endpoint::Proxy(id) | Endpoint::Pad(id) => self.ports.get(&id).map(|port| port.multi),
            Endpoint::Tack(id) => self.tacks.get(&id).map(|tack| tack.multi),
        };
        multi.unwrap_or(false)
    }

    /// The group a route attached to this endpoint is drawn in
    pub fn scope(&self, end: Endpoint) -> Option<NodeId> {
        match end {
            Endpoint::Pin(id) => {
                let pin = self.pins.get(&id)?;
                self.nodes.get(&pin.node)?.parent
            }
            Endpoint::Proxy(id) => self.ports.get(&id).map(|port| port.group),
            Endpoint::Pad(id) => {
                let port = self.ports.get(&id)?;
                self.nodes.get(&port.group)?.parent
            }
            Endpoint::Tack(id) => {
                let tack = self.tacks.get(&id)?;
                self.buses.get(&tack.bus).map(|bus| bus.group)
            }
        }
    }

    /// `node` followed by each of its ancestors up to the top-level group
    pub fn lineage(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            if chain.contains(&id) {
                break;
            }
            chain.push(id);
            current = self.nodes.get(&id).and_then(|node| node.parent);
        }
        chain
    }

    /// Whether this group or one of its ancestors is an external link
    pub fn inside_link(&self, group: NodeId) -> bool {
        self.lineage(group).into_iter().any(|id| {
            self.nodes
                .get(&id)
                .and_then(Node::as_group)
                .map(|group| group.link.is_some())
                .unwrap_or(false)
        })
    }

    pub fn terminal_exists(&self, terminal: Terminal) -> bool {
        match terminal {
            Terminal::Pin(id) => self.pins.contains_key(&id),
            Terminal::Proxy(id) | Terminal::Pad(id) => self.ports.contains_key(&id),
            Terminal::Bus(id) => self.buses.contains_key(&id),
        }
    }

    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    fn claim(&mut self, requested: Option<u32>) -> Result<u32> {
        match requested {
            Some(id) => {
                let taken = self.nodes.contains_key(&NodeId(id))
                    || self.buses.contains_key(&BusId(id))
                    || self.pins.contains_key(&PinId(id))
                    || self.ports.contains_key(&PortId(id))
                    || self.tacks.contains_key(&TackId(id))
                    || self.routes.contains_key(&RouteId(id));
                if taken || id == 0 {
                    return Err(GraphError::DuplicateId(id));
                }
                self.ids.reserve(id);
                Ok(id)
            }
            None => Ok(self.ids.next()),
        }
    }

    fn insert_node(
        &mut self,
        requested: Option<NodeId>,
        parent: NodeId,
        name: String,
        kind: NodeKind,
    ) -> Result<NodeId> {
        self.group(parent)?;
        let id = NodeId(self.claim(requested.map(u32::from))?);
        self.nodes.insert(
            id,
            Node {
                id,
                name,
                parent: Some(parent),
                kind,
                settings: serde_json::Map::new(),
                rect: None,
                imported: false,
            },
        );
        self.group_mut(parent)?.children.push(id);
        Ok(id)
    }

    pub fn add_group(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId> {
        self.add_group_as(None, parent, name)
    }

    pub fn add_group_as(
        &mut self,
        id: Option<NodeId>,
        parent: NodeId,
        name: impl Into<String>,
    ) -> Result<NodeId> {
        self.insert_node(id, parent, name.into(), NodeKind::Group(GroupNode::default()))
    }

    pub fn add_source(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        behavior: BehaviorRef,
    ) -> Result<NodeId> {
        self.add_source_as(None, parent, name, behavior)
    }

    pub fn add_source_as(
        &mut self,
        id: Option<NodeId>,
        parent: NodeId,
        name: impl Into<String>,
        behavior: BehaviorRef,
    ) -> Result<NodeId> {
        let kind = NodeKind::Source(SourceNode {
            behavior,
            pins: Vec::new(),
        });
        self.insert_node(id, parent, name.into(), kind)
    }

    /// Add a pin; names are unique per node and direction
    pub fn add_pin(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        direction: Direction,
        channel: bool,
    ) -> Result<PinId> {
        let name = name.into();
        self.source(node)?;
        if self.find_pin(node, &name, direction).is_some() {
            return Err(GraphError::DuplicateName { node, name });
        }

        let id = PinId(self.ids.next());
        let multi = multi::is_multi(&name);
        self.pins.insert(
            id,
            Pin {
                id,
                node,
                name,
                direction,
                channel,
                multi,
                routes: Vec::new(),
                label: None,
            },
        );
        if let Some(source) = self.node_mut(node)?.as_source_mut() {
            source.pins.push(id);
        }
        Ok(id)
    }

    /// Add a Proxy/Pad pair to a group. `direction` is the Pad's direction.
    pub fn add_port(
        &mut self,
        group: NodeId,
        name: impl Into<String>,
        direction: Direction,
        channel: bool,
    ) -> Result<PortId> {
        let name = name.into();
        self.group(group)?;
        if self.find_port(group, &name).is_some() {
            return Err(GraphError::DuplicateName { node: group, name });
        }

        let id = PortId(self.ids.next());
        let multi = multi::is_multi(&name);
        self.ports.insert(
            id,
            Port {
                id,
                group,
                name,
                direction,
                channel,
                multi,
                pad_routes: Vec::new(),
                proxy_routes: Vec::new(),
                pad_label: None,
                proxy_label: None,
            },
        );
        self.group_mut(group)?.ports.push(id);
        Ok(id)
    }

    pub fn add_bus(
        &mut self,
        group: NodeId,
        name: impl Into<String>,
        filter: Option<BehaviorRef>,
    ) -> Result<BusId> {
        self.add_bus_as(None, group, name, filter)
    }

    pub fn add_bus_as(
        &mut self,
        id: Option<BusId>,
        group: NodeId,
        name: impl Into<String>,
        filter: Option<BehaviorRef>,
    ) -> Result<BusId> {
        self.group(group)?;
        let id = BusId(self.claim(id.map(u32::from))?);
        self.buses.insert(
            id,
            Bus {
                id,
                group,
                name: name.into(),
                filter,
                tacks: Vec::new(),
                rect: None,
                imported: false,
            },
        );
        self.group_mut(group)?.buses.push(id);
        Ok(id)
    }

    pub fn set_link(&mut self, group: NodeId, location: impl Into<String>) -> Result<()> {
        self.group_mut(group)?.link = Some(ExternalLink::new(location));
        Ok(())
    }

    pub fn set_link_state(&mut self, group: NodeId, state: LinkState) -> Result<()> {
        if let Some(link) = self.group_mut(group)?.link.as_mut() {
            link.state = state;
        }
        Ok(())
    }

    pub fn set_library(&mut self, group: NodeId, location: Option<String>) -> Result<()> {
        self.group_mut(group)?.library = location;
        Ok(())
    }

    pub fn set_settings(
        &mut self,
        node: NodeId,
        settings: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.node_mut(node)?.settings = settings;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Presentation
    // ---------------------------------------------------------------------

    pub fn set_node_rect(&mut self, node: NodeId, rect: Option<Rect>) -> Result<()> {
        self.node_mut(node)?.rect = rect;
        Ok(())
    }

    pub fn set_group_view(&mut self, group: NodeId, view: Option<ViewTransform>) -> Result<()> {
        self.group_mut(group)?.view = view;
        Ok(())
    }

    pub fn set_pin_label(&mut self, pin: PinId, label: Option<Point>) -> Result<()> {
        let pin = self
            .pins
            .get_mut(&pin)
            .ok_or_else(|| GraphError::EntityNotFound(format!("pin#{}", pin)))?;
        pin.label = label;
        Ok(())
    }

    pub fn set_port_labels(
        &mut self,
        port: PortId,
        pad: Option<Point>,
        proxy: Option<Point>,
    ) -> Result<()> {
        let port = self
            .ports
            .get_mut(&port)
            .ok_or_else(|| GraphError::EntityNotFound(format!("port#{}", port)))?;
        port.pad_label = pad;
        port.proxy_label = proxy;
        Ok(())
    }

    pub fn set_bus_rect(&mut self, bus: BusId, rect: Option<Rect>) -> Result<()> {
        let bus = self
            .buses
            .get_mut(&bus)
            .ok_or_else(|| GraphError::EntityNotFound(format!("bus#{}", bus)))?;
        bus.rect = rect;
        Ok(())
    }

    pub fn set_route_wire(&mut self, route: RouteId, wire: Vec<Point>) -> Result<()> {
        let route = self
            .routes
            .get_mut(&route)
            .ok_or_else(|| GraphError::EntityNotFound(format!("route#{}", route)))?;
        route.wire = wire;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Routes
    // ---------------------------------------------------------------------

    /// Endpoint a terminal stands for once attached; buses have none until
    /// a tack is created for them
    pub(crate) fn terminal_endpoint(terminal: Terminal) -> Option<Endpoint> {
        match terminal {
            Terminal::Pin(id) => Some(Endpoint::Pin(id)),
            Terminal::Proxy(id) => Some(Endpoint::Proxy(id)),
            Terminal::Pad(id) => Some(Endpoint::Pad(id)),
            Terminal::Bus(_) => None,
        }
    }

    /// Create a route between two terminals. Callers validate legality
    /// first; a bus terminal becomes a tack facing the other end.
    pub(crate) fn attach(&mut self, a: Terminal, b: Terminal) -> Result<RouteId> {
        for terminal in [a, b] {
            if !self.terminal_exists(terminal) {
                return Err(GraphError::EntityNotFound(terminal.to_string()));
            }
        }
        if matches!((a, b), (Terminal::Bus(_), Terminal::Bus(_))) {
            return Err(GraphError::EntityNotFound("bus-to-bus route".to_string()));
        }

        let id = RouteId(self.ids.next());
        let end_a = self.attach_end(id, a, b);
        let end_b = self.attach_end(id, b, a);
        self.routes.insert(
            id,
            Route {
                id,
                a: end_a,
                b: end_b,
                wire: Vec::new(),
            },
        );
        Ok(id)
    }

    fn attach_end(&mut self, route: RouteId, this: Terminal, other: Terminal) -> Endpoint {
        match this {
            Terminal::Pin(id) => {
                if let Some(pin) = self.pins.get_mut(&id) {
                    pin.routes.push(route);
                }
                Endpoint::Pin(id)
            }
            Terminal::Proxy(id) => {
                if let Some(port) = self.ports.get_mut(&id) {
                    port.proxy_routes.push(route);
                }
                Endpoint::Proxy(id)
            }
            Terminal::Pad(id) => {
                if let Some(port) = self.ports.get_mut(&id) {
                    port.pad_routes.push(route);
                }
                Endpoint::Pad(id)
            }
            Terminal::Bus(bus) => {
                let far = Self::terminal_endpoint(other);
                let flow = match far.and_then(|end| self.direction(end)) {
                    Some(Direction::Output) => TackFlow::Incoming,
                    _ => TackFlow::Outgoing,
                };
                let message = far
                    .and_then(|end| self.name(end))
                    .unwrap_or_default()
                    .to_string();
                let multi = far.map(|end| self.is_multi(end)).unwrap_or(false);

                let id = TackId(self.ids.next());
                self.tacks.insert(
                    id,
                    Tack {
                        id,
                        bus,
                        route,
                        flow,
                        message,
                        multi,
                    },
                );
                if let Some(bus) = self.buses.get_mut(&bus) {
                    bus.tacks.push(id);
                }
                Endpoint::Tack(id)
            }
        }
    }

    /// Remove a route and any tacks it created
    pub(crate) fn detach(&mut self, id: RouteId) -> Option<Route> {
        let route = self.routes.remove(&id)?;
        for end in [route.a, route.b] {
            match end {
                Endpoint::Pin(pin) => {
                    if let Some(pin) = self.pins.get_mut(&pin) {
                        pin.routes.retain(|r| *r != id);
                    }
                }
                Endpoint::Proxy(port) => {
                    if let Some(port) = self.ports.get_mut(&port) {
                        port.proxy_routes.retain(|r| *r != id);
                    }
                }
                Endpoint::Pad(port) => {
                    if let Some(port) = self.ports.get_mut(&port) {
                        port.pad_routes.retain(|r| *r != id);
                    }
                }
                Endpoint::Tack(tack) => {
                    if let Some(tack) = self.tacks.remove(&tack) {
                        if let Some(bus) = self.buses.get_mut(&tack.bus) {
                            bus.tacks.retain(|t| *t != tack.id);
                        }
                    }
                }
            }
        }
        Some(route)
    }

    /// Every route touching an endpoint owned by `node` or its descendants,
    /// including routes drawn inside a group
    pub fn routes_within(&self, node: NodeId) -> Vec<RouteId> {
        let mut found = Vec::new();
        self.collect_routes_within(node, &mut found);
        found.sort();
        found.dedup();
        found
    }

    fn collect_routes_within(&self, node: NodeId, found: &mut Vec<RouteId>) {
        let Some(node) = self.nodes.get(&node) else {
            return;
        };
        match &node.kind {
            NodeKind::Source(source) => {
                for pin in &source.pins {
                    found.extend(self.routes_of(Endpoint::Pin(*pin)));
                }
            }
            NodeKind::Group(group) => {
                for port in &group.ports {
                    found.extend(self.routes_of(Endpoint::Pad(*port)));
                    found.extend(self.routes_of(Endpoint::Proxy(*port)));
                }
                for bus in &group.buses {
                    if let Some(bus) = self.buses.get(bus) {
                        for tack in &bus.tacks {
                            found.extend(self.routes_of(Endpoint::Tack(*tack)));
                        }
                    }
                }
                for child in &group.children {
                    self.collect_routes_within(*child, found);
                }
            }
        }
    }

    /// Remove a node and everything it owns. Routes must already be detached.
    pub(crate) fn remove_subtree(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(GraphError::RootExists(id));
        }
        let node = self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))?;
        if let Some(parent) = node.parent {
            if let Ok(group) = self.group_mut(parent) {
                group.children.retain(|child| *child != id);
            }
        }
        self.drop_owned(node);
        Ok(())
    }

    fn drop_owned(&mut self, node: Node) {
        match node.kind {
            NodeKind::Source(source) => {
                for pin in source.pins {
                    self.pins.remove(&pin);
                }
            }
            NodeKind::Group(group) => {
                for port in group.ports {
                    self.ports.remove(&port);
                }
                for bus in group.buses {
                    if let Some(bus) = self.buses.remove(&bus) {
                        for tack in bus.tacks {
                            self.tacks.remove(&tack);
                        }
                    }
                }
                for child in group.children {
                    if let Some(child) = self.nodes.remove(&child) {
                        self.drop_owned(child);
                    }
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // External links
    // ---------------------------------------------------------------------

    /// Copy the top-level contents of `linked` into `group` with fresh ids.
    ///
    /// The linked graph's top-level ports bind to the group's ports by name;
    /// ports the group does not declare yet are added.
    pub(crate) fn instantiate(&mut self, group: NodeId, linked: &Graph) -> Result<()> {
        self.group(group)?;
        let linked_root = linked.group(linked.root)?;

        let mut ports: HashMap<PortId, PortId> = HashMap::new();
        for port_id in &linked_root.ports {
            let Some(port) = linked.port(*port_id) else {
                continue;
            };
            let local = match self.find_port(group, &port.name) {
                Some(local) => local,
                None => self.add_port(group, port.name.clone(), port.direction, port.channel)?,
            };
            ports.insert(*port_id, local);
        }

        let mut mapping = Mapping {
            ports,
            ..Mapping::default()
        };
        self.copy_contents(linked, linked.root, group, &mut mapping)?;

        for route in linked.routes() {
            let (Some(a), Some(b)) = (
                mapping.terminal(linked, route.a),
                mapping.terminal(linked, route.b),
            ) else {
                continue;
            };
            let id = self.attach(a, b)?;
            if let Some(copied) = self.routes.get_mut(&id) {
                copied.wire = route.wire.clone();
            }
        }
        Ok(())
    }

    fn copy_contents(
        &mut self,
        linked: &Graph,
        from: NodeId,
        into: NodeId,
        mapping: &mut Mapping,
    ) -> Result<()> {
        let source_group = linked.group(from)?;

        for bus_id in &source_group.buses {
            let Some(bus) = linked.bus(*bus_id) else {
                continue;
            };
            let copy = self.add_bus(into, bus.name.clone(), bus.filter.clone())?;
            if let Some(copied) = self.buses.get_mut(&copy) {
                copied.rect = bus.rect;
                copied.imported = true;
            }
            mapping.buses.insert(*bus_id, copy);
        }

        for child_id in &source_group.children {
            let child = linked.require_node(*child_id)?;
            let copy = match &child.kind {
                NodeKind::Source(source) => {
                    let copy = self.add_source(into, child.name.clone(), source.behavior.clone())?;
                    for pin_id in &source.pins {
                        if let Some(pin) = linked.pin(*pin_id) {
                            let pin_copy =
                                self.add_pin(copy, pin.name.clone(), pin.direction, pin.channel)?;
                            self.set_pin_label(pin_copy, pin.label)?;
                            mapping.pins.insert(*pin_id, pin_copy);
                        }
                    }
                    copy
                }
                NodeKind::Group(nested) => {
                    let copy = self.add_group(into, child.name.clone())?;
                    for port_id in &nested.ports {
                        if let Some(port) = linked.port(*port_id) {
                            let port_copy =
                                self.add_port(copy, port.name.clone(), port.direction, port.channel)?;
                            self.set_port_labels(port_copy, port.pad_label, port.proxy_label)?;
                            mapping.ports.insert(*port_id, port_copy);
                        }
                    }
                    let group = self.group_mut(copy)?;
                    group.link = nested.link.clone();
                    group.library = nested.library.clone();
                    group.view = nested.view;
                    self.copy_contents(linked, *child_id, copy, mapping)?;
                    copy
                }
            };
            let node = self.node_mut(copy)?;
            node.settings = child.settings.clone();
            node.rect = child.rect;
            node.imported = true;
        }
        Ok(())
    }
}

/// Id translation used while instantiating a linked graph
#[derive(Default)]
struct Mapping {
    pins: HashMap<PinId, PinId>,
    ports: HashMap<PortId, PortId>,
    buses: HashMap<BusId, BusId>,
}

impl Mapping {
    fn terminal(&self, linked: &Graph, end: Endpoint) -> Option<Terminal> {
        match end {
            Endpoint::Pin(id) => self.pins.get(&id).copied().map(Terminal::Pin),
            Endpoint::Proxy(id) => self.ports.get(&id).copied().map(Terminal::Proxy),
            Endpoint::Pad(id) => {
                // the linked model's own top-level pads face nothing
                let port = linked.port(id)?;
                if port.group == linked.root() {
                    return None;
                }
                self.ports.get(&id).copied().map(Terminal::Pad)
            }
            Endpoint::Tack(id) => {
                let tack = linked.tack(id)?;
                self.buses.get(&tack.bus).copied().map(Terminal::Bus)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_names_unique_per_direction() {
        let mut graph = Graph::new("root");
        let node = graph.add_source(graph.root(), "X", BehaviorRef::new("x")).unwrap();
        graph.add_pin(node, "go", Direction::Output, false).unwrap();
        graph.add_pin(node, "go", Direction::Input, false).unwrap();
        let err = graph.add_pin(node, "go", Direction::Output, false).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateName { .. }));
    }

    #[test]
    fn test_pins_only_on_sources() {
        let mut graph = Graph::new("root");
        let root = graph.root();
        assert_eq!(
            graph.add_pin(root, "go", Direction::Output, false),
            Err(GraphError::NotASource(root))
        );
    }

    #[test]
    fn test_explicit_ids_are_reserved() {
        let mut graph = Graph::with_root_id(NodeId(5), "root");
        let node = graph
            .add_source_as(Some(NodeId(9)), NodeId(5), "X", BehaviorRef::new("x"))
            .unwrap();
        assert_eq!(node, NodeId(9));
        let next = graph.add_group(NodeId(5), "G").unwrap();
        assert!(next.0 > 9);
        assert_eq!(
            graph.add_bus_as(Some(BusId(9)), NodeId(5), "bus", None),
            Err(GraphError::DuplicateId(9))
        );
    }

    #[test]
    fn test_port_directions() {
        let mut graph = Graph::new("root");
        let group = graph.add_group(graph.root(), "G").unwrap();
        let port = graph.add_port(group, "in", Direction::Input, false).unwrap();
        assert_eq!(graph.direction(Endpoint::Pad(port)), Some(Direction::Input));
        assert_eq!(graph.direction(Endpoint::Proxy(port)), Some(Direction::Output));
        assert_eq!(graph.scope(Endpoint::Proxy(port)), Some(group));
        assert_eq!(graph.scope(Endpoint::Pad(port)), Some(graph.root()));
    }

    #[test]
    fn test_bus_attachment_creates_facing_tack() {
        let mut graph = Graph::new("root");
        let root = graph.root();
        let x = graph.add_source(root, "X", BehaviorRef::new("x")).unwrap();
        let out = graph.add_pin(x, "go", Direction::Output, false).unwrap();
        let bus = graph.add_bus(root, "bus", None).unwrap();

        let route = graph.attach(Terminal::Pin(out), Terminal::Bus(bus)).unwrap();
        let tack_id = graph.bus(bus).unwrap().tacks[0];
        let tack = graph.tack(tack_id).unwrap();
        assert_eq!(tack.flow, TackFlow::Incoming);
        assert_eq!(tack.message, "go");
        assert_eq!(graph.routes_of(Endpoint::Tack(tack_id)), &[route]);

        graph.detach(route).unwrap();
        assert!(graph.bus(bus).unwrap().tacks.is_empty());
        assert!(graph.tack(tack_id).is_none());
        assert!(graph.pin(out).unwrap().routes.is_empty());
    }

    #[test]
    fn test_remove_subtree_drops_owned_entities() {
        let mut graph = Graph::new("root");
        let group = graph.add_group(graph.root(), "G").unwrap();
        let inner = graph.add_source(group, "X", BehaviorRef::new("x")).unwrap();
        let pin = graph.add_pin(inner, "go", Direction::Output, false).unwrap();
        let port = graph.add_port(group, "out", Direction::Output, false).unwrap();

        graph.remove_subtree(group).unwrap();
        assert!(graph.node(inner).is_none());
        assert!(graph.pin(pin).is_none());
        assert!(graph.port(port).is_none());
        assert!(graph.group(graph.root()).unwrap().children.is_empty());
    }

    #[test]
    fn test_instantiate_binds_ports_by_name() {
        let mut linked = Graph::new("lib");
        let lib_root = linked.root();
        let port = linked.add_port(lib_root, "in", Direction::Input, false).unwrap();
        let worker = linked.add_source(lib_root, "W", BehaviorRef::new("w")).unwrap();
        let pin = linked.add_pin(worker, "in", Direction::Input, false).unwrap();
        linked.attach(Terminal::Proxy(port), Terminal::Pin(pin)).unwrap();

        let mut graph = Graph::new("app");
        let group = graph.add_group(graph.root(), "G").unwrap();
        graph.set_link(group, "lib").unwrap();
        graph.instantiate(group, &linked).unwrap();

        let local_port = graph.find_port(group, "in").unwrap();
        let children = &graph.group(group).unwrap().children;
        assert_eq!(children.len(), 1);
        assert!(graph.node(children[0]).unwrap().imported);
        assert_eq!(graph.routes_of(Endpoint::Proxy(local_port)).len(), 1);
    }
}
