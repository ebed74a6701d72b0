//! # Endpoint & Graph Model
//!
//! Plain data for hierarchical message-passing graphs: nodes, pins, the
//! Proxy/Pad pairs on group boundaries, buses with their tacks, and routes.
//! Entities reference each other by id through the [`Graph`] arena.

mod endpoint;
mod geometry;
mod graph;
mod ids;
mod node;
mod wiring;

pub use endpoint::{
    Direction, Endpoint, EndpointClass, TackFlow, Target, TargetKey, TargetOwner, Terminal,
};
pub use geometry::{Point, Rect, ViewTransform};
pub use graph::Graph;
pub use ids::{BusId, IdAllocator, NodeId, PinId, PortId, RouteId, TackId};
pub use node::{BehaviorRef, ExternalLink, GroupNode, LinkState, Node, NodeKind, SourceNode};
pub use wiring::{Bus, Pin, Port, Route, Tack};
