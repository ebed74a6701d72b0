//! # Endpoints
//!
//! The things a route can be attached to, and the handful of properties the
//! resolver asks of each of them.

use super::ids::{BusId, NodeId, PinId, PortId, TackId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message flow direction of an endpoint as seen by the route attached to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }

    pub fn is_output(self) -> bool {
        self == Self::Output
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Whether a tack carries messages into its bus or out of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TackFlow {
    Incoming,
    Outgoing,
}

impl TackFlow {
    /// A tack receiving from a route is an input of that route
    pub fn direction(self) -> Direction {
        match self {
            Self::Incoming => Direction::Input,
            Self::Outgoing => Direction::Output,
        }
    }
}

/// One end of a route
///
/// A Group's boundary is one [`Port`](super::Port) seen from two sides:
/// `Proxy` from inside the group, `Pad` from outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    Pin(PinId),
    Proxy(PortId),
    Pad(PortId),
    Tack(TackId),
}

/// Endpoint classes used for pair legality. A proxy behaves as a pin to the
/// routes inside its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Pin,
    Pad,
    Tack,
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pin => write!(f, "pin"),
            Self::Pad => write!(f, "pad"),
            Self::Tack => write!(f, "tack"),
        }
    }
}

impl Endpoint {
    pub fn class(&self) -> EndpointClass {
        match self {
            Self::Pin(_) | Self::Proxy(_) => EndpointClass::Pin,
            Self::Pad(_) => EndpointClass::Pad,
            Self::Tack(_) => EndpointClass::Tack,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pin(id) => write!(f, "pin#{}", id),
            Self::Proxy(id) => write!(f, "proxy#{}", id),
            Self::Pad(id) => write!(f, "pad#{}", id),
            Self::Tack(id) => write!(f, "tack#{}", id),
        }
    }
}

/// What a caller names when asking for a new connection.
///
/// Buses are named as a whole; the tack is created by the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    Pin(PinId),
    Proxy(PortId),
    Pad(PortId),
    Bus(BusId),
}

impl From<PinId> for Terminal {
    fn from(id: PinId) -> Self {
        Self::Pin(id)
    }
}

impl From<BusId> for Terminal {
    fn from(id: BusId) -> Self {
        Self::Bus(id)
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pin(id) => write!(f, "pin#{}", id),
            Self::Proxy(id) => write!(f, "proxy#{}", id),
            Self::Pad(id) => write!(f, "pad#{}", id),
            Self::Bus(id) => write!(f, "bus#{}", id),
        }
    }
}

/// A concrete destination in a destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// An input pin on a Source node
    Pin { node: NodeId, pin: PinId },
    /// A tack on a filtered bus; forwarding is decided at runtime
    Tack { bus: BusId, tack: TackId },
    /// A port of the top-level group with nowhere further to go
    Boundary { group: NodeId, port: PortId },
}

/// Owner half of a target's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetOwner {
    Node(NodeId),
    Bus(BusId),
}

/// Structural identity of a target: owner id plus endpoint name.
///
/// Two routes can reach the same destination through different paths; the
/// tables compare keys, never the path taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    pub owner: TargetOwner,
    pub name: String,
}
