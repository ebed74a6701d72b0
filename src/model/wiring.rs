//! # Wiring Entities
//!
//! Pins, ports, buses, tacks and routes. Routes hold endpoint ids and every
//! endpoint holds the ids of its routes, so traversal always goes through the
//! [`Graph`](super::Graph) arena.

use super::endpoint::{Direction, Endpoint, TackFlow};
use super::geometry::{Point, Rect};
use super::ids::{BusId, NodeId, PinId, PortId, RouteId, TackId};
use super::node::BehaviorRef;

/// Named message endpoint on a Source node
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub id: PinId,
    pub node: NodeId,
    pub name: String,
    pub direction: Direction,
    /// Requests on this pin expect a reply
    pub channel: bool,
    /// The name is a multi-message pattern
    pub multi: bool,
    pub routes: Vec<RouteId>,
    pub label: Option<Point>,
}

/// Boundary of a Group node.
///
/// The Pad faces outward and has `direction`; the Proxy faces inward and has
/// the opposite direction, so a message entering through an input Pad leaves
/// the Proxy as an output to the group's interior.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub id: PortId,
    pub group: NodeId,
    pub name: String,
    pub direction: Direction,
    pub channel: bool,
    pub multi: bool,
    pub pad_routes: Vec<RouteId>,
    pub proxy_routes: Vec<RouteId>,
    pub pad_label: Option<Point>,
    pub proxy_label: Option<Point>,
}

impl Port {
    pub fn pad_direction(&self) -> Direction {
        self.direction
    }

    pub fn proxy_direction(&self) -> Direction {
        self.direction.opposite()
    }
}

/// Many-to-many medium. Transparent to resolution unless it has a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub id: BusId,
    pub group: NodeId,
    pub name: String,
    pub filter: Option<BehaviorRef>,
    pub tacks: Vec<TackId>,
    pub rect: Option<Rect>,
    /// Instantiated from an external link
    pub imported: bool,
}

impl Bus {
    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }
}

/// One route's attachment to a bus
#[derive(Debug, Clone, PartialEq)]
pub struct Tack {
    pub id: TackId,
    pub bus: BusId,
    pub route: RouteId,
    pub flow: TackFlow,
    /// Name of the message carried, taken from the route's other end
    pub message: String,
    pub multi: bool,
}

/// A single wire between two endpoints. Which end is the sender follows from
/// the endpoints' own directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub a: Endpoint,
    pub b: Endpoint,
    pub wire: Vec<Point>,
}

impl Route {
    /// The endpoint opposite `end`, if `end` belongs to this route
    pub fn other(&self, end: Endpoint) -> Option<Endpoint> {
        if self.a == end {
            Some(self.b)
        } else if self.b == end {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn touches(&self, end: Endpoint) -> bool {
        self.a == end || self.b == end
    }
}
