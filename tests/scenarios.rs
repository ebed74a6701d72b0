//! End-to-end scenarios: build a graph, connect it, compile it, persist it.

use pinflow::model::{PortId, Terminal};
use pinflow::{
    BehaviorRef, Blueprint, BusId, CompilerOptions, Compilation, DiagnosticKind, Direction,
    Endpoint, LayoutOptions, NodeId, PinId, ProgramWriter, Resolver,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Small builder around a blueprint's top-level group
struct Scene {
    blueprint: Blueprint,
}

impl Scene {
    fn new() -> Self {
        init_tracing();
        Self {
            blueprint: Blueprint::new("app"),
        }
    }

    fn root(&self) -> NodeId {
        self.blueprint.graph().root()
    }

    fn source(&mut self, parent: NodeId, name: &str, behavior: &str) -> NodeId {
        self.blueprint
            .graph_mut()
            .add_source(parent, name, BehaviorRef::new(behavior))
            .unwrap()
    }

    fn group(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.blueprint.graph_mut().add_group(parent, name).unwrap()
    }

    fn output(&mut self, node: NodeId, name: &str) -> PinId {
        self.blueprint
            .graph_mut()
            .add_pin(node, name, Direction::Output, false)
            .unwrap()
    }

    fn input(&mut self, node: NodeId, name: &str) -> PinId {
        self.blueprint
            .graph_mut()
            .add_pin(node, name, Direction::Input, false)
            .unwrap()
    }

    fn port(&mut self, group: NodeId, name: &str, direction: Direction) -> PortId {
        self.blueprint
            .graph_mut()
            .add_port(group, name, direction, false)
            .unwrap()
    }

    fn bus(&mut self, group: NodeId, name: &str, filter: Option<&str>) -> BusId {
        self.blueprint
            .graph_mut()
            .add_bus(group, name, filter.map(BehaviorRef::new))
            .unwrap()
    }

    fn compile(&self) -> Compilation {
        self.blueprint.compile(&CompilerOptions::default())
    }
}

fn rows(compilation: &Compilation, node: NodeId) -> Vec<String> {
    compilation
        .program
        .node(node)
        .map(|node| node.outputs.iter().map(ToString::to_string).collect())
        .unwrap_or_default()
}

#[test]
fn scenario_a_direct_route() {
    let mut scene = Scene::new();
    let root = scene.root();
    let x = scene.source(root, "X", "ticker");
    let y = scene.source(root, "Y", "printer");
    let out = scene.output(x, "go");
    let go = scene.input(y, "go");
    scene.blueprint.connect(out, go).unwrap();

    let compilation = scene.compile();
    assert_eq!(rows(&compilation, x), vec![format!("go -> go @ Y ({})", y)]);
    assert!(compilation.diagnostics.is_empty());
}

#[test]
fn scenario_b_multi_message_overlap() {
    let mut scene = Scene::new();
    let root = scene.root();
    let x = scene.source(root, "X", "ticker");
    let y = scene.source(root, "Y", "printer");
    let out = scene.output(x, "evt [a,b]");
    let input = scene.input(y, "evt [a,c]");
    scene.blueprint.connect(out, input).unwrap();

    let compilation = scene.compile();
    assert_eq!(
        rows(&compilation, x),
        vec![format!("evt a -> evt a @ Y ({})", y), "evt b -> []".to_string()]
    );
    assert_eq!(
        compilation
            .diagnostics
            .of_kind(DiagnosticKind::EmptyDestinationRow)
            .count(),
        1
    );
}

#[test]
fn scenario_c_unfiltered_bus_fans_out() {
    let mut scene = Scene::new();
    let root = scene.root();
    let x = scene.source(root, "X", "ticker");
    let y = scene.source(root, "Y", "printer");
    let z = scene.source(root, "Z", "printer");
    let out = scene.output(x, "go");
    let go_y = scene.input(y, "go");
    let go_z = scene.input(z, "go");
    let bus = scene.bus(root, "bus", None);
    scene.blueprint.connect(out, bus).unwrap();
    scene.blueprint.connect(bus, go_y).unwrap();
    scene.blueprint.connect(bus, go_z).unwrap();

    let compilation = scene.compile();
    assert_eq!(
        rows(&compilation, x),
        vec![format!("go -> [go @ Y ({}), go @ Z ({})]", y, z)]
    );
    assert!(compilation.program.filters.is_empty());

    // an unfiltered bus is never a destination of its own
    let destinations = &compilation.program.nodes[0].outputs[0].destinations;
    assert!(destinations.iter().all(|d| d.owner_id != bus.0));
}

#[test]
fn unfiltered_bus_never_renames_a_message() {
    let mut scene = Scene::new();
    let root = scene.root();
    let x = scene.source(root, "X", "ticker");
    let y = scene.source(root, "Y", "printer");
    let out = scene.output(x, "go");
    let stop = scene.input(y, "stop");
    let bus = scene.bus(root, "bus", None);
    scene.blueprint.connect(out, bus).unwrap();
    scene.blueprint.connect(bus, stop).unwrap();

    let compilation = scene.compile();
    assert_eq!(rows(&compilation, x), vec!["go -> []".to_string()]);
    assert!(scene.blueprint.destinations(Endpoint::Pin(out)).is_empty());
}

#[test]
fn filter_delivers_each_message_to_its_own_listeners() {
    let mut scene = Scene::new();
    let root = scene.root();
    let a = scene.source(root, "A", "ticker");
    let b = scene.source(root, "B", "ticker");
    let y = scene.source(root, "Y", "printer");
    let z = scene.source(root, "Z", "printer");
    let go = scene.output(a, "go");
    let halt = scene.output(b, "halt");
    let go_in = scene.input(y, "go");
    let halt_in = scene.input(z, "halt");
    let bus = scene.bus(root, "gate", Some("throttle"));
    scene.blueprint.connect(go, bus).unwrap();
    scene.blueprint.connect(halt, bus).unwrap();
    scene.blueprint.connect(bus, go_in).unwrap();
    scene.blueprint.connect(bus, halt_in).unwrap();

    let compilation = scene.compile();
    let filter_rows: Vec<String> = compilation
        .program
        .filter(bus)
        .unwrap()
        .rows
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        filter_rows,
        vec![
            format!("go -> go @ Y ({})", y),
            format!("halt -> halt @ Z ({})", z),
        ]
    );
}

#[test]
fn scenario_d_filtered_bus_stops_resolution() {
    let mut scene = Scene::new();
    let root = scene.root();
    let x = scene.source(root, "X", "ticker");
    let y = scene.source(root, "Y", "printer");
    let out = scene.output(x, "go");
    let go = scene.input(y, "go");
    let bus = scene.bus(root, "gate", Some("throttle"));
    scene.blueprint.connect(out, bus).unwrap();
    scene.blueprint.connect(bus, go).unwrap();

    let compilation = scene.compile();
    assert_eq!(rows(&compilation, x), vec![format!("go -> go @ gate ({})", bus)]);

    let filter = compilation.program.filter(bus).unwrap();
    assert_eq!(filter.filter, "throttle");
    let filter_rows: Vec<String> = filter.rows.iter().map(ToString::to_string).collect();
    assert_eq!(filter_rows, vec![format!("go -> go @ Y ({})", y)]);

    // the filtered bus is never expanded into its fan-out
    let destinations = &compilation.program.node(x).unwrap().outputs[0].destinations;
    assert!(destinations.iter().all(|d| d.owner_id != y.0));
}

#[test]
fn filter_rows_skip_repeated_variants() {
    let mut scene = Scene::new();
    let root = scene.root();
    let a = scene.source(root, "A", "ticker");
    let b = scene.source(root, "B", "ticker");
    let y = scene.source(root, "Y", "printer");
    let from_a = scene.output(a, "evt [a,b]");
    let from_b = scene.output(b, "evt [b,c]");
    let sink = scene.input(y, "evt [a,b,c]");
    let bus = scene.bus(root, "gate", Some("throttle"));
    scene.blueprint.connect(from_a, bus).unwrap();
    scene.blueprint.connect(from_b, bus).unwrap();
    scene.blueprint.connect(bus, sink).unwrap();

    let compilation = scene.compile();
    let variants: Vec<&str> = compilation
        .program
        .filter(bus)
        .unwrap()
        .rows
        .iter()
        .map(|row| row.variant.as_str())
        .collect();
    assert_eq!(variants, vec!["evt a", "evt b", "evt c"]);
}

#[test]
fn nested_groups_resolve_through_ports() {
    let mut scene = Scene::new();
    let root = scene.root();
    let outer = scene.group(root, "outer");
    let inner = scene.group(outer, "inner");
    let x = scene.source(inner, "X", "ticker");
    let y = scene.source(root, "Y", "printer");
    let out = scene.output(x, "go");
    let go = scene.input(y, "go");
    let inner_port = scene.port(inner, "go", Direction::Output);
    let outer_port = scene.port(outer, "go", Direction::Output);

    // the inner pad sends out through the enclosing group's proxy
    let bp = &mut scene.blueprint;
    bp.connect(out, Terminal::Proxy(inner_port)).unwrap();
    bp.connect(Terminal::Pad(inner_port), Terminal::Proxy(outer_port)).unwrap();
    bp.connect(Terminal::Pad(outer_port), go).unwrap();

    let compilation = scene.compile();
    assert_eq!(rows(&compilation, x), vec![format!("go -> go @ Y ({})", y)]);
    assert!(compilation.diagnostics.is_empty());
}

#[test]
fn rejected_connections_change_nothing() {
    let mut scene = Scene::new();
    let root = scene.root();
    let x = scene.source(root, "X", "ticker");
    let y = scene.source(root, "Y", "printer");
    let a = scene.output(x, "go");
    let b = scene.output(y, "go");
    let ask = scene
        .blueprint
        .graph_mut()
        .add_pin(y, "ask", Direction::Input, true)
        .unwrap();

    let before = scene.blueprint.split();
    assert!(scene.blueprint.connect(a, b).is_err());
    assert!(scene.blueprint.connect(a, ask).is_err());
    assert_eq!(scene.blueprint.split(), before);
    assert!(scene.blueprint.destinations(Endpoint::Pin(a)).is_empty());
}

#[test]
fn connect_then_disconnect_restores_resolution() {
    let mut scene = Scene::new();
    let root = scene.root();
    let x = scene.source(root, "X", "ticker");
    let y = scene.source(root, "Y", "printer");
    let z = scene.source(root, "Z", "printer");
    let out = scene.output(x, "go");
    let go_y = scene.input(y, "go");
    let go_z = scene.input(z, "go");
    let bus = scene.bus(root, "bus", None);
    scene.blueprint.connect(out, bus).unwrap();
    scene.blueprint.connect(bus, go_y).unwrap();

    let origin = Endpoint::Pin(out);
    let before = scene.blueprint.resolve(origin);

    let route = scene.blueprint.connect(bus, go_z).unwrap();
    let during = scene.blueprint.resolve(origin);
    assert_eq!(during.len(), before.len() + 1);
    assert!(before.iter().all(|target| during.contains(target)));
    assert_eq!(scene.blueprint.destinations(origin), during.as_slice());

    assert!(scene.blueprint.disconnect(route));
    assert_eq!(scene.blueprint.resolve(origin), before);
    assert_eq!(scene.blueprint.destinations(origin), before.as_slice());
}

#[test]
fn incremental_tables_match_rebuild() {
    let mut scene = Scene::new();
    let root = scene.root();
    let g = scene.group(root, "G");
    let x = scene.source(root, "X", "ticker");
    let w = scene.source(g, "W", "worker");
    let y = scene.source(root, "Y", "printer");
    let out = scene.output(x, "evt [a,b]");
    let work = scene.input(w, "evt a");
    let done = scene.output(w, "done");
    let sink = scene.input(y, "done");
    let port_in = scene.port(g, "evt [a,b]", Direction::Input);
    let port_out = scene.port(g, "done", Direction::Output);
    let bus = scene.bus(root, "bus", None);

    let bp = &mut scene.blueprint;
    bp.connect(out, Terminal::Pad(port_in)).unwrap();
    let inner = bp.connect(Terminal::Proxy(port_in), work).unwrap();
    bp.connect(done, Terminal::Proxy(port_out)).unwrap();
    bp.connect(Terminal::Pad(port_out), bus).unwrap();
    bp.connect(bus, sink).unwrap();
    assert_eq!(bp.resolver(), &Resolver::build(bp.graph()));

    bp.disconnect(inner);
    assert_eq!(bp.resolver(), &Resolver::build(bp.graph()));
    assert!(bp.destinations(Endpoint::Pin(out)).is_empty());
    assert_eq!(bp.destinations(Endpoint::Pin(done)).len(), 1);
}

#[test]
fn compiling_twice_is_byte_identical() {
    let mut scene = Scene::new();
    let root = scene.root();
    let x = scene.source(root, "X", "ticker");
    let g = scene.group(root, "G");
    scene
        .blueprint
        .graph_mut()
        .set_library(g, Some("lib/".to_string()))
        .unwrap();
    let w = scene.source(g, "W", "ticker");
    let y = scene.source(root, "Y", "printer");
    let a = scene.output(x, "evt [a,b,c]");
    let b = scene.output(w, "go");
    let sink = scene.input(y, "evt [c,a]");
    let bus = scene.bus(root, "gate", Some("throttle"));
    scene.blueprint.connect(a, sink).unwrap();
    scene.blueprint.connect(b, bus).unwrap();

    let first = scene.compile();
    let second = scene.compile();
    assert_eq!(first.program.to_json().unwrap(), second.program.to_json().unwrap());
    assert_eq!(
        ProgramWriter::new(&first.program).generate_program(),
        ProgramWriter::new(&second.program).generate_program()
    );

    // the same identifier from two locations is aliased
    let sections = first.program.imports.sections();
    assert_eq!(sections[0].location, "./");
    assert_eq!(sections[1].location, "lib/");
    assert_eq!(sections[1].items[0].binding(), "ticker_1");
    assert!(first.diagnostics.has(DiagnosticKind::DuplicateBehaviorIdentifier));
    assert_eq!(first.program.node(w).unwrap().behavior, "ticker_1");
}

#[test]
fn documents_survive_a_round_trip() {
    let mut scene = Scene::new();
    let root = scene.root();
    let g = scene.group(root, "G");
    let x = scene.source(root, "X", "ticker");
    let w = scene.source(g, "W", "worker");
    let out = scene.output(x, "go");
    let go = scene.input(w, "go");
    let port = scene.port(g, "go", Direction::Input);
    let bus = scene.bus(root, "gate", Some("throttle"));
    scene.blueprint.connect(out, bus).unwrap();
    scene.blueprint.connect(bus, Terminal::Pad(port)).unwrap();
    scene.blueprint.connect(Terminal::Proxy(port), go).unwrap();

    // first save synthesizes nothing, geometry comes from the load below
    let (behavioral, _) = scene.blueprint.save().unwrap();
    let loaded = Blueprint::load("app", &behavioral, None, &LayoutOptions::default()).unwrap();
    let (behavioral, visual) = loaded.save().unwrap();

    let reloaded =
        Blueprint::load("app", &behavioral, Some(&visual), &LayoutOptions::default()).unwrap();
    assert!(reloaded.diagnostics().is_empty());
    assert_eq!(reloaded.save().unwrap(), (behavioral, visual));
    assert_eq!(
        reloaded.compile(&CompilerOptions::default()).program,
        scene.compile().program
    );
}

#[test]
fn linked_group_is_compiled_but_not_saved() {
    init_tracing();
    let mut library = Blueprint::new("lib");
    let lib_root = library.graph().root();
    let graph = library.graph_mut();
    let port = graph.add_port(lib_root, "job", Direction::Input, false).unwrap();
    let worker = graph.add_source(lib_root, "W", BehaviorRef::new("worker")).unwrap();
    let job = graph.add_pin(worker, "job", Direction::Input, false).unwrap();
    library.connect(Terminal::Proxy(port), job).unwrap();

    let mut scene = Scene::new();
    let root = scene.root();
    let g = scene.group(root, "G");
    scene.blueprint.graph_mut().set_link(g, "lib").unwrap();
    scene.blueprint.expand_link(g, &library).unwrap();
    let x = scene.source(root, "X", "ticker");
    let out = scene.output(x, "job");
    let local = scene.blueprint.graph().find_port(g, "job").unwrap();
    scene.blueprint.connect(out, Terminal::Pad(local)).unwrap();

    let compilation = scene.compile();
    let copy = scene.blueprint.graph().group(g).unwrap().children[0];
    assert_eq!(rows(&compilation, x), vec![format!("job -> job @ W ({})", copy)]);

    let (behavioral, _) = scene.blueprint.split();
    let linked = &behavioral.root.children[0];
    assert_eq!(linked.link.as_deref(), Some("lib"));
    assert!(linked.children.is_empty());
    assert_eq!(linked.ports.len(), 1);
    assert_eq!(behavioral.connections.len(), 1);
}
