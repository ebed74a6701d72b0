//! Connection legality: endpoint pair classes, direction, channel and
//! multi-message overlap. Nothing here mutates the graph.

use crate::error::ConnectError;
use crate::model::{Direction, Endpoint, EndpointClass, Graph, RouteId, Terminal};
use crate::multi;

fn class(terminal: Terminal) -> EndpointClass {
    match terminal {
        Terminal::Pin(_) | Terminal::Proxy(_) => EndpointClass::Pin,
        Terminal::Pad(_) => EndpointClass::Pad,
        Terminal::Bus(_) => EndpointClass::Tack,
    }
}

/// Validate a prospective connection between `a` and `b`
pub fn check(graph: &Graph, a: Terminal, b: Terminal) -> Result<(), ConnectError> {
    for terminal in [a, b] {
        if !graph.terminal_exists(terminal) {
            return Err(ConnectError::UnknownEndpoint(terminal.to_string()));
        }
    }

    let same_port = match (a, b) {
        (Terminal::Proxy(x), Terminal::Pad(y)) | (Terminal::Pad(x), Terminal::Proxy(y)) => x == y,
        _ => false,
    };
    if a == b || same_port {
        return Err(ConnectError::SelfConnection);
    }

    match (class(a), class(b)) {
        (EndpointClass::Pad, EndpointClass::Pad) | (EndpointClass::Tack, EndpointClass::Tack) => {
            return Err(ConnectError::IllegalPair {
                a: class(a),
                b: class(b),
            });
        }
        _ => {}
    }

    // a bus adapts its tack to whatever it is connected to
    let (Some(end_a), Some(end_b)) = (Graph::terminal_endpoint(a), Graph::terminal_endpoint(b))
    else {
        return Ok(());
    };

    let (dir_a, dir_b) = (graph.direction(end_a), graph.direction(end_b));
    if dir_a == dir_b {
        return Err(ConnectError::DirectionMismatch(dir_a.unwrap_or(Direction::Input)));
    }

    let (output, input) = if dir_a == Some(Direction::Output) {
        (end_a, end_b)
    } else {
        (end_b, end_a)
    };
    let name_of = |end: Endpoint| graph.name(end).unwrap_or_default().to_string();

    if graph.channel(input) == Some(true) && graph.channel(output) != Some(true) {
        return Err(ConnectError::ChannelMismatch {
            input: name_of(input),
            output: name_of(output),
        });
    }

    if graph.is_multi(end_a) || graph.is_multi(end_b) {
        let (name_a, name_b) = (name_of(end_a), name_of(end_b));
        if !multi::overlap(&name_a, &name_b) {
            return Err(ConnectError::NoVariantOverlap {
                a: name_a,
                b: name_b,
            });
        }
    }

    Ok(())
}

/// An existing route already joining `a` and `b`
pub fn existing_route(graph: &Graph, a: Terminal, b: Terminal) -> Option<RouteId> {
    let (anchor, other) = match (Graph::terminal_endpoint(a), Graph::terminal_endpoint(b)) {
        (Some(end), _) => (end, b),
        (None, Some(end)) => (end, a),
        (None, None) => return None,
    };

    graph.routes_of(anchor).iter().copied().find(|route_id| {
        let Some(far) = graph.route(*route_id).and_then(|route| route.other(anchor)) else {
            return false;
        };
        match (other, far) {
            (Terminal::Bus(bus), Endpoint::Tack(tack)) => graph
                .tack(tack)
                .map(|tack| tack.bus == bus)
                .unwrap_or(false),
            (terminal, far) => Graph::terminal_endpoint(terminal) == Some(far),
        }
    })
}

/// The endpoint sending along a route
pub fn sender(graph: &Graph, route: RouteId) -> Option<Endpoint> {
    let route = graph.route(route)?;
    if graph.direction(route.a) == Some(Direction::Output) {
        Some(route.a)
    } else {
        Some(route.b)
    }
}
