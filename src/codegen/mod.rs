//! # Program Generation
//!
//! Descriptor types for compiled programs and the text listing writer.

mod descriptors;
mod program_writer;

pub use descriptors::*;
pub use program_writer::ProgramWriter;
