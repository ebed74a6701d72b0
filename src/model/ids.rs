//! # Entity Identifiers
//!
//! Stable ids for every entity in a [`Graph`](super::Graph). All ids are drawn
//! from a single counter, so a node id never collides with a bus id. That
//! matters for destination descriptors, which print either kind as `(<id>)`.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identity of a Source or Group node
    NodeId
);
entity_id!(
    /// Identity of a pin on a Source node
    PinId
);
entity_id!(
    /// Identity of a Proxy/Pad pair on a Group node
    PortId
);
entity_id!(
    /// Identity of a bus
    BusId
);
entity_id!(
    /// Identity of a route's attachment to a bus
    TackId
);
entity_id!(
    /// Identity of a route
    RouteId
);

/// Monotonic id source shared by every entity kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next(&mut self) -> u32 {
        let id = self.next.max(1);
        self.next = id + 1;
        id
    }

    /// Make sure ids loaded from a document are never handed out again
    pub fn reserve(&mut self, id: u32) {
        if id >= self.next {
            self.next = id + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_skips_reserved_ids() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next(), 1);
        ids.reserve(10);
        assert_eq!(ids.next(), 11);
        ids.reserve(4);
        assert_eq!(ids.next(), 12);
    }

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&NodeId(7)).unwrap();
        assert_eq!(json, "7");
        let back: BusId = serde_json::from_str("9").unwrap();
        assert_eq!(back, BusId(9));
    }
}
