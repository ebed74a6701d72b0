//! # Connectivity Resolver
//!
//! Keeps a destination table for every origin (output pins and the outgoing
//! tacks of filtered buses) and patches those tables as routes come and go.
//!
//! Tables are rebuilt in full when a model loads. After that, `connect`
//! appends newly reachable destinations and `disconnect` removes exactly the
//! ones that became unreachable. Destinations are compared by
//! [`TargetKey`](crate::model::TargetKey), never by the path that reached them.

pub mod legality;
pub mod traverse;

pub use traverse::{is_origin, origins, resolve, target_key, upstream_origins};

use crate::error::ConnectError;
use crate::model::{Endpoint, Graph, RouteId, Target, TargetKey, Terminal};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolver {
    tables: BTreeMap<Endpoint, Vec<Target>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every table from scratch
    pub fn build(graph: &Graph) -> Self {
        let mut resolver = Self::new();
        resolver.rebuild(graph);
        resolver
    }

    pub fn rebuild(&mut self, graph: &Graph) {
        self.tables.clear();
        for origin in origins(graph) {
            let found = resolve(graph, origin);
            if !found.is_empty() {
                self.tables.insert(origin, found);
            }
        }
        tracing::info!("[RESOLVER] Rebuilt {} destination table(s)", self.tables.len());
    }

    /// Current destinations of an origin
    pub fn destinations(&self, origin: Endpoint) -> &[Target] {
        self.tables.get(&origin).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Connect two terminals.
    ///
    /// Either the route is created and every affected table is patched, or
    /// the connection is rejected and nothing changes. Connecting an already
    /// connected pair returns the existing route.
    pub fn connect(
        &mut self,
        graph: &mut Graph,
        a: Terminal,
        b: Terminal,
    ) -> Result<RouteId, ConnectError> {
        legality::check(graph, a, b)?;

        if let Some(existing) = legality::existing_route(graph, a, b) {
            tracing::debug!("[RESOLVER] {} and {} already joined by route {}", a, b, existing);
            return Ok(existing);
        }

        let route = graph
            .attach(a, b)
            .map_err(|err| ConnectError::UnknownEndpoint(err.to_string()))?;

        let affected = legality::sender(graph, route)
            .map(|sender| upstream_origins(graph, sender))
            .unwrap_or_default();

        let mut patched = Vec::with_capacity(affected.len());
        for origin in affected {
            let current = self.tables.get(&origin).cloned().unwrap_or_default();
            let mut known: HashSet<TargetKey> = current
                .iter()
                .filter_map(|target| target_key(graph, target))
                .collect();

            let mut table = current;
            for target in resolve(graph, origin) {
                if let Some(key) = target_key(graph, &target) {
                    if known.insert(key) {
                        table.push(target);
                    }
                }
            }
            patched.push((origin, table));
        }

        tracing::info!(
            "[RESOLVER] Connected {} -> {} as route {} ({} table(s) patched)",
            a,
            b,
            route,
            patched.len()
        );
        self.apply(patched);
        Ok(route)
    }

    /// Remove a route. Returns `false` when the route does not exist.
    pub fn disconnect(&mut self, graph: &mut Graph, route: RouteId) -> bool {
        let Some(sender) = legality::sender(graph, route) else {
            tracing::debug!("[RESOLVER] Route {} already gone", route);
            return false;
        };

        // keys are taken before the route goes, while every target still exists
        let affected: Vec<(Endpoint, Vec<(Target, Option<TargetKey>)>)> =
            upstream_origins(graph, sender)
                .into_iter()
                .map(|origin| {
                    let keyed = self
                        .destinations(origin)
                        .iter()
                        .map(|target| (*target, target_key(graph, target)))
                        .collect();
                    (origin, keyed)
                })
                .collect();

        graph.detach(route);

        let mut patched = Vec::with_capacity(affected.len());
        for (origin, keyed) in affected {
            let reachable: HashMap<TargetKey, Target> = if graph.contains(origin) {
                resolve(graph, origin)
                    .into_iter()
                    .filter_map(|target| target_key(graph, &target).map(|key| (key, target)))
                    .collect()
            } else {
                HashMap::new()
            };

            let table = keyed
                .into_iter()
                .filter_map(|(_, key)| key.and_then(|key| reachable.get(&key).copied()))
                .collect();
            patched.push((origin, table));
        }

        tracing::info!(
            "[RESOLVER] Disconnected route {} ({} table(s) patched)",
            route,
            patched.len()
        );
        self.apply(patched);
        true
    }

    fn apply(&mut self, patched: Vec<(Endpoint, Vec<Target>)>) {
        for (origin, table) in patched {
            if table.is_empty() {
                self.tables.remove(&origin);
            } else {
                self.tables.insert(origin, table);
            }
        }
    }

    /// Drop tables whose origin no longer exists
    pub fn prune(&mut self, graph: &Graph) {
        self.tables.retain(|origin, _| graph.contains(*origin));
    }
}
