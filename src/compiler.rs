//! # Pinflow Compiler
//!
//! Main entry points for flattening a hierarchical graph into a
//! [`CompiledProgram`].
//!
//! Compilation runs in three phases:
//!
//! 1. **Flattening** - walk the node tree and list every Source node and
//!    filtered bus in traversal order
//! 2. **Imports** - assign every behavior reference a location and binding
//! 3. **Descriptors** - build input specs and per-variant output rows from the
//!    resolver's destination tables
//!
//! Nothing here fails. Broken links, empty groups and empty rows are reported
//! as diagnostics next to the program.

use crate::blueprint::Blueprint;
use crate::codegen::{
    CompiledProgram, Destination, FilterDescriptor, InputSpec, NodeDescriptor, OutputRow,
};
use crate::config::CompilerOptions;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::imports::{self, ImportManifest};
use crate::model::{
    BehaviorRef, BusId, Direction, Endpoint, Graph, LinkState, NodeId, NodeKind, TackFlow, Target,
};
use crate::multi;
use crate::resolver::Resolver;
use serde::Serialize;
use std::collections::HashSet;

/// Result of a compile: the program plus everything worth telling the author
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compilation {
    pub program: CompiledProgram,
    pub diagnostics: Diagnostics,
    pub stats: CompilationStats,
}

/// Compilation statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CompilationStats {
    /// Groups visited, including the top-level group
    pub groups: usize,
    pub sources: usize,
    pub filters: usize,
    /// Output rows across nodes and filters
    pub rows: usize,
    pub empty_rows: usize,
    pub imports: usize,
    /// Groups skipped because their link is broken
    pub broken_links: usize,
}

impl CompilationStats {
    pub fn log_summary(&self) {
        tracing::info!("[COMPILER] === Compilation Statistics ===");
        tracing::info!("[COMPILER]   Groups:       {}", self.groups);
        tracing::info!("[COMPILER]   Sources:      {}", self.sources);
        tracing::info!("[COMPILER]   Filters:      {}", self.filters);
        tracing::info!("[COMPILER]   Rows:         {} ({} empty)", self.rows, self.empty_rows);
        tracing::info!("[COMPILER]   Imports:      {}", self.imports);
        if self.broken_links > 0 {
            tracing::info!("[COMPILER]   Broken links: {}", self.broken_links);
        }
    }
}

/// Compile a graph, resolving every destination table from scratch
///
/// This is the entry point for graphs that have no live resolver, such as a
/// graph assembled in code or freshly deserialized.
///
/// # Arguments
///
/// * `graph` - The graph to flatten
/// * `options` - Import locations, alias separator and empty-row reporting
///
/// # Returns
///
/// The [`Compilation`]: the program, the diagnostics gathered while building
/// it, and statistics. Compilation itself never fails.
///
/// # Examples
///
/// ```rust
/// use pinflow::{compile_graph, BehaviorRef, CompilerOptions, Graph};
///
/// let mut graph = Graph::new("app");
/// let root = graph.root();
/// graph.add_source(root, "X", BehaviorRef::new("ticker"))?;
///
/// let compilation = compile_graph(&graph, &CompilerOptions::default());
/// assert_eq!(compilation.program.nodes.len(), 1);
/// # Ok::<(), pinflow::GraphError>(())
/// ```
pub fn compile_graph(graph: &Graph, options: &CompilerOptions) -> Compilation {
    let resolver = Resolver::build(graph);
    compile_with_resolver(graph, &resolver, options)
}

/// Compile a live model using the tables it already maintains
///
/// # Arguments
///
/// * `blueprint` - The model whose graph and destination tables are compiled
/// * `options` - Import locations, alias separator and empty-row reporting
///
/// # Returns
///
/// The [`Compilation`] of the model's current state. Load diagnostics stay on
/// the blueprint and are not copied into the result.
pub fn compile_blueprint(blueprint: &Blueprint, options: &CompilerOptions) -> Compilation {
    compile_with_resolver(blueprint.graph(), blueprint.resolver(), options)
}

/// Compile a graph against an existing set of destination tables
///
/// The tables must describe `graph`; they are read, never patched.
///
/// # Arguments
///
/// * `graph` - The graph to flatten
/// * `resolver` - Destination tables for every origin in `graph`
/// * `options` - Import locations, alias separator and empty-row reporting
///
/// # Returns
///
/// The [`Compilation`], with one diagnostic for each skipped group, duplicate
/// behavior identifier and, when enabled, empty destination row.
pub fn compile_with_resolver(
    graph: &Graph,
    resolver: &Resolver,
    options: &CompilerOptions,
) -> Compilation {
    let name = graph
        .node(graph.root())
        .map(|root| root.name.clone())
        .unwrap_or_default();
    tracing::info!("[COMPILER] Starting compilation of '{}'", name);
    tracing::info!(
        "[COMPILER] Graph: {} nodes, {} routes",
        graph.nodes().count(),
        graph.route_count()
    );

    let mut diagnostics = Diagnostics::new();
    let mut stats = CompilationStats::default();

    // Phase 1: Flatten the tree
    tracing::info!("[COMPILER] Phase 1: Flattening node tree...");
    let mut units = Vec::new();
    flatten(graph, graph.root(), &mut units, &mut diagnostics, &mut stats);
    tracing::info!("[COMPILER] Found {} runtime unit(s)", units.len());

    // Phase 2: Imports
    tracing::info!("[COMPILER] Phase 2: Resolving behavior imports...");
    let mut manifest = ImportManifest::new(options.alias_separator.clone());
    let mut bindings = Vec::with_capacity(units.len());
    for unit in &units {
        let Some((reference, scope, subject)) = unit.behavior(graph) else {
            continue;
        };
        let location = imports::location_for(graph, scope, reference, &options.default_location);
        let binding = manifest.add(&reference.identifier, location, Some(subject), &mut diagnostics);
        bindings.push((*unit, binding));
    }
    stats.imports = manifest.len();

    // Phase 3: Descriptors
    tracing::info!("[COMPILER] Phase 3: Building destination rows...");
    let mut builder = RowBuilder {
        graph,
        resolver,
        options,
        diagnostics: &mut diagnostics,
        stats: &mut stats,
    };
    let mut nodes = Vec::new();
    let mut filters = Vec::new();
    for (unit, binding) in bindings {
        match unit {
            Unit::Source(id) => {
                if let Some(node) = builder.node_descriptor(id, binding) {
                    nodes.push(node);
                }
            }
            Unit::Filter(bus) => {
                if let Some(filter) = builder.filter_descriptor(bus, binding) {
                    filters.push(filter);
                }
            }
        }
    }

    stats.log_summary();
    tracing::info!("[COMPILER] Compilation complete ({} diagnostic(s))", diagnostics.len());

    Compilation {
        program: CompiledProgram {
            name,
            imports: manifest,
            nodes,
            filters,
        },
        diagnostics,
        stats,
    }
}

/// One runtime element of the flattened program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Source(NodeId),
    Filter(BusId),
}

impl Unit {
    /// Behavior reference, the node its location is looked up from, and the
    /// diagnostic subject
    fn behavior<'g>(&self, graph: &'g Graph) -> Option<(&'g BehaviorRef, NodeId, NodeId)> {
        match *self {
            Unit::Source(id) => Some((&graph.source(id).ok()?.behavior, id, id)),
            Unit::Filter(bus) => {
                let bus = graph.bus(bus)?;
                Some((bus.filter.as_ref()?, bus.group, bus.group))
            }
        }
    }
}

/// Collect runtime units below `group`: its filtered buses, then its children
/// in order
fn flatten(
    graph: &Graph,
    group_id: NodeId,
    units: &mut Vec<Unit>,
    diagnostics: &mut Diagnostics,
    stats: &mut CompilationStats,
) {
    let Some(node) = graph.node(group_id) else {
        return;
    };
    let Some(group) = node.as_group() else {
        return;
    };
    stats.groups += 1;

    if let Some(link) = &group.link {
        if let LinkState::Broken(reason) = &link.state {
            stats.broken_links += 1;
            diagnostics.warn(
                DiagnosticKind::BrokenGroupLink,
                Some(group_id.0),
                format!("group '{}' skipped, link '{}' is broken: {}", node.name, link.location, reason),
            );
            return;
        }
    }

    let filtered = group
        .buses
        .iter()
        .any(|bus| graph.bus(*bus).map(|bus| bus.is_filtered()).unwrap_or(false));
    if group.children.is_empty() && !filtered {
        diagnostics.warn(
            DiagnosticKind::EmptyGroup,
            Some(group_id.0),
            format!("group '{}' has nothing to compile", node.name),
        );
        return;
    }

    for bus_id in &group.buses {
        if graph.bus(*bus_id).map(|bus| bus.is_filtered()).unwrap_or(false) {
            units.push(Unit::Filter(*bus_id));
        }
    }

    for child_id in &group.children {
        let Some(child) = graph.node(*child_id) else {
            continue;
        };
        match child.kind {
            NodeKind::Source(_) => {
                tracing::debug!("[COMPILER] Source '{}' ({})", child.name, child.id);
                units.push(Unit::Source(*child_id));
            }
            NodeKind::Group(_) => flatten(graph, *child_id, units, diagnostics, stats),
        }
    }
}

struct RowBuilder<'a> {
    graph: &'a Graph,
    resolver: &'a Resolver,
    options: &'a CompilerOptions,
    diagnostics: &'a mut Diagnostics,
    stats: &'a mut CompilationStats,
}

impl<'a> RowBuilder<'a> {
    fn node_descriptor(&mut self, id: NodeId, behavior: String) -> Option<NodeDescriptor> {
        let graph = self.graph;
        let node = graph.node(id)?;
        let source = node.as_source()?;
        self.stats.sources += 1;

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for pin in source.pins.iter().filter_map(|pin| graph.pin(*pin)) {
            match pin.direction {
                Direction::Input => {
                    inputs.extend(multi::expand(&pin.name).into_iter().map(|name| InputSpec {
                        name,
                        channel: pin.channel,
                    }));
                }
                Direction::Output => {
                    let origin = Endpoint::Pin(pin.id);
                    for variant in multi::expand(&pin.name) {
                        let destinations = self.destinations(origin, &variant, pin.multi);
                        outputs.push(self.row(id, &node.name, variant, destinations));
                    }
                }
            }
        }

        Some(NodeDescriptor {
            name: node.name.clone(),
            id,
            behavior,
            inputs,
            outputs,
        })
    }

    /// Rows of a filtered bus: one per distinct variant arriving on an
    /// incoming tack, delivered to everything reached from the outgoing tacks
    /// carrying that variant
    fn filter_descriptor(&mut self, bus_id: BusId, filter: String) -> Option<FilterDescriptor> {
        let graph = self.graph;
        let bus = graph.bus(bus_id)?;
        self.stats.filters += 1;

        let tacks: Vec<_> = bus.tacks.iter().filter_map(|tack| graph.tack(*tack)).collect();
        let outgoing: Vec<_> = tacks
            .iter()
            .filter(|tack| tack.flow == TackFlow::Outgoing)
            .collect();

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for incoming in tacks.iter().filter(|tack| tack.flow == TackFlow::Incoming) {
            for variant in multi::expand(&incoming.message) {
                if !seen.insert(variant.clone()) {
                    continue;
                }
                let mut destinations: Vec<Destination> = Vec::new();
                // a variant only leaves through tacks that carry it
                for tack in outgoing
                    .iter()
                    .filter(|tack| multi::overlap(&variant, &tack.message))
                {
                    let origin = Endpoint::Tack(tack.id);
                    for destination in self.destinations(origin, &variant, incoming.multi) {
                        if !destinations.contains(&destination) {
                            destinations.push(destination);
                        }
                    }
                }
                rows.push(self.row(bus.group, &bus.name, variant, destinations));
            }
        }

        Some(FilterDescriptor {
            name: bus.name.clone(),
            bus: bus_id,
            filter,
            rows,
        })
    }

    /// Destinations of one concrete `variant` leaving `origin`
    fn destinations(&self, origin: Endpoint, variant: &str, source_multi: bool) -> Vec<Destination> {
        let graph = self.graph;
        self.resolver
            .destinations(origin)
            .iter()
            .filter_map(|target| {
                let received = match *target {
                    // the filter decides at runtime; the variant passes as is
                    Target::Tack { .. } => Some(variant.to_string()),
                    Target::Pin { pin, .. } => {
                        multi::destination_variant(variant, source_multi, &graph.pin(pin)?.name)
                    }
                    Target::Boundary { port, .. } => {
                        multi::destination_variant(variant, source_multi, &graph.port(port)?.name)
                    }
                }?;
                Destination::describe(graph, target, received)
            })
            .collect()
    }

    fn row(
        &mut self,
        subject: NodeId,
        owner: &str,
        variant: String,
        destinations: Vec<Destination>,
    ) -> OutputRow {
        self.stats.rows += 1;
        if destinations.is_empty() {
            self.stats.empty_rows += 1;
            if self.options.report_empty_rows {
                self.diagnostics.warn(
                    DiagnosticKind::EmptyDestinationRow,
                    Some(subject.0),
                    format!("'{}' on '{}' reaches nothing", variant, owner),
                );
            }
        }
        OutputRow {
            variant,
            destinations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Terminal;

    #[test]
    fn test_broken_link_contributes_nothing() {
        let mut graph = Graph::new("app");
        let root = graph.root();
        let linked = graph.add_group(root, "L").unwrap();
        graph.set_link(linked, "lib/missing").unwrap();
        graph
            .set_link_state(linked, LinkState::Broken("not found".to_string()))
            .unwrap();
        graph.add_source(root, "X", BehaviorRef::new("x")).unwrap();

        let compilation = compile_graph(&graph, &CompilerOptions::default());
        assert_eq!(compilation.program.nodes.len(), 1);
        assert_eq!(compilation.stats.broken_links, 1);
        assert!(compilation.diagnostics.has(DiagnosticKind::BrokenGroupLink));
    }

    #[test]
    fn test_empty_group_is_a_warning() {
        let mut graph = Graph::new("app");
        let root = graph.root();
        graph.add_group(root, "hollow").unwrap();
        graph.add_source(root, "X", BehaviorRef::new("x")).unwrap();

        let compilation = compile_graph(&graph, &CompilerOptions::default());
        assert!(compilation.diagnostics.has(DiagnosticKind::EmptyGroup));
        assert_eq!(compilation.program.nodes.len(), 1);
    }

    #[test]
    fn test_input_specs_expand_in_pin_order() {
        let mut graph = Graph::new("app");
        let root = graph.root();
        let x = graph.add_source(root, "X", BehaviorRef::new("x")).unwrap();
        graph.add_pin(x, "ask", Direction::Input, true).unwrap();
        graph.add_pin(x, "evt [a,b]", Direction::Input, false).unwrap();

        let compilation = compile_graph(&graph, &CompilerOptions::default());
        let names: Vec<_> = compilation.program.nodes[0]
            .inputs
            .iter()
            .map(|input| (input.name.as_str(), input.channel))
            .collect();
        assert_eq!(names, vec![("ask", true), ("evt a", false), ("evt b", false)]);
    }

    #[test]
    fn test_top_level_boundary_renders_via_group() {
        let mut graph = Graph::new("app");
        let root = graph.root();
        let port = graph.add_port(root, "out", Direction::Output, false).unwrap();
        let x = graph.add_source(root, "X", BehaviorRef::new("x")).unwrap();
        let out = graph.add_pin(x, "out", Direction::Output, false).unwrap();

        let mut resolver = Resolver::new();
        resolver
            .connect(&mut graph, Terminal::Pin(out), Terminal::Proxy(port))
            .unwrap();
        let compilation = compile_with_resolver(&graph, &resolver, &CompilerOptions::default());
        assert_eq!(
            compilation.program.nodes[0].outputs[0].to_string(),
            format!("out -> out @ app ({})", root)
        );
    }

    #[test]
    fn test_empty_rows_can_be_silenced() {
        let mut graph = Graph::new("app");
        let root = graph.root();
        let x = graph.add_source(root, "X", BehaviorRef::new("x")).unwrap();
        graph.add_pin(x, "go", Direction::Output, false).unwrap();

        let options = CompilerOptions {
            report_empty_rows: false,
            ..CompilerOptions::default()
        };
        let compilation = compile_graph(&graph, &options);
        assert_eq!(compilation.stats.empty_rows, 1);
        assert!(!compilation.diagnostics.has(DiagnosticKind::EmptyDestinationRow));
        assert_eq!(compilation.program.nodes[0].outputs[0].to_string(), "go -> []");
    }

    #[test]
    fn test_group_without_runtime_content_is_empty() {
        let mut graph = Graph::new("app");
        let root = graph.root();
        let wiring = graph.add_group(root, "wiring").unwrap();
        graph.add_bus(wiring, "bus", None).unwrap();
        graph.add_port(wiring, "go", Direction::Input, false).unwrap();
        let gated = graph.add_group(root, "gated").unwrap();
        graph
            .add_bus(gated, "gate", Some(BehaviorRef::new("throttle")))
            .unwrap();

        let compilation = compile_graph(&graph, &CompilerOptions::default());
        let empty: Vec<_> = compilation
            .diagnostics
            .of_kind(DiagnosticKind::EmptyGroup)
            .map(|diagnostic| diagnostic.subject)
            .collect();
        assert_eq!(empty, vec![Some(wiring.0)]);
        assert_eq!(compilation.program.filters.len(), 1);
    }

    #[test]
    fn test_filter_rows_follow_matching_tacks() {
        let mut graph = Graph::new("app");
        let root = graph.root();
        let a = graph.add_source(root, "A", BehaviorRef::new("a")).unwrap();
        let b = graph.add_source(root, "B", BehaviorRef::new("b")).unwrap();
        let y = graph.add_source(root, "Y", BehaviorRef::new("y")).unwrap();
        let z = graph.add_source(root, "Z", BehaviorRef::new("z")).unwrap();
        let go = graph.add_pin(a, "go", Direction::Output, false).unwrap();
        let halt = graph.add_pin(b, "halt", Direction::Output, false).unwrap();
        let go_in = graph.add_pin(y, "go", Direction::Input, false).unwrap();
        let halt_in = graph.add_pin(z, "halt", Direction::Input, false).unwrap();
        let bus = graph
            .add_bus(root, "gate", Some(BehaviorRef::new("throttle")))
            .unwrap();

        let mut resolver = Resolver::new();
        for (from, to) in [
            (Terminal::Pin(go), Terminal::Bus(bus)),
            (Terminal::Pin(halt), Terminal::Bus(bus)),
            (Terminal::Bus(bus), Terminal::Pin(go_in)),
            (Terminal::Bus(bus), Terminal::Pin(halt_in)),
        ] {
            resolver.connect(&mut graph, from, to).unwrap();
        }

        let compilation = compile_with_resolver(&graph, &resolver, &CompilerOptions::default());
        let rows: Vec<String> = compilation
            .program
            .filter(bus)
            .unwrap()
            .rows
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            rows,
            vec![
                format!("go -> go @ Y ({})", y),
                format!("halt -> halt @ Z ({})", z),
            ]
        );
    }
}
