//! # Pinflow Graph Compiler
//!
//! Connectivity resolution and flattening for hierarchical message-passing
//! graphs.
//!
//! An application is authored as a tree of nodes. Source nodes run a named
//! behavior and expose pins; Group nodes contain other nodes, buses, and the
//! Proxy/Pad ports forming their boundary. Pinflow provides:
//! - Destination tables resolved through ports and unfiltered buses, kept
//!   current as routes are connected and disconnected
//! - Multi-message names (`evt [a,b]`) matched by variant
//! - Flattening into an ordered list of node and filter descriptors with a
//!   deduplicated behavior import manifest
//! - Behavioral/visual document split and join
//! - An async model registry with single-fetch loading of linked models
//!
//! ## Quick Start
//!
//! ```rust
//! use pinflow::{Blueprint, BehaviorRef, CompilerOptions, Direction};
//!
//! let mut blueprint = Blueprint::new("app");
//! let root = blueprint.graph().root();
//! let graph = blueprint.graph_mut();
//! let x = graph.add_source(root, "X", BehaviorRef::new("ticker"))?;
//! let y = graph.add_source(root, "Y", BehaviorRef::new("printer"))?;
//! let out = graph.add_pin(x, "go", Direction::Output, false)?;
//! let input = graph.add_pin(y, "go", Direction::Input, false)?;
//! blueprint.connect(out, input)?;
//!
//! let compilation = blueprint.compile(&CompilerOptions::default());
//! assert_eq!(
//!     compilation.program.nodes[0].outputs[0].to_string(),
//!     format!("go -> go @ Y ({})", y)
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! 1. **Model** - arena of nodes, pins, ports, buses, tacks and routes
//! 2. **Resolver** - per-origin destination tables, patched on every edit
//! 3. **Compiler** - tree flattening, import manifest, destination rows
//! 4. **Codegen** - descriptor types and the program listing writer
//! 5. **Blueprint / Registry** - persistence and loading

pub mod blueprint;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod imports;
pub mod model;
pub mod multi;
pub mod registry;
pub mod resolver;

// Re-export the main compilation API
pub use compiler::{
    compile_blueprint,
    compile_graph,
    compile_with_resolver,
    Compilation,
    CompilationStats,
};

pub use blueprint::{join, split, BehavioralDoc, Blueprint, LayoutFidelity, VisualDoc};
pub use codegen::{CompiledProgram, Destination, FilterDescriptor, NodeDescriptor, OutputRow, ProgramWriter};
pub use config::{CompilerOptions, LayoutOptions};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{ConnectError, GraphError, LoadError, StoreError};
pub use imports::ImportManifest;
pub use model::{
    BehaviorRef, BusId, Direction, Endpoint, Graph, NodeId, PinId, PortId, RouteId, Target,
    Terminal,
};
pub use registry::{DocumentKind, DocumentStore, MemoryStore, ModelRegistry};
pub use resolver::Resolver;
