//! # Program Description Writer
//!
//! Renders a [`CompiledProgram`] as a stable text listing. The listing is
//! meant for humans and for diffing builds; runtime loaders take the JSON
//! form from [`CompiledProgram::to_json`].

use super::descriptors::{CompiledProgram, FilterDescriptor, NodeDescriptor, OutputRow};
use std::fmt::Write;

pub struct ProgramWriter<'a> {
    program: &'a CompiledProgram,
}

impl<'a> ProgramWriter<'a> {
    pub fn new(program: &'a CompiledProgram) -> Self {
        Self { program }
    }

    /// Generate the complete listing
    pub fn generate_program(&self) -> String {
        let mut code = String::new();

        code.push_str("// Auto-generated program description from Pinflow\n");
        code.push_str("// DO NOT EDIT - Changes will be overwritten\n");
        let _ = writeln!(code, "// Program: {}\n", self.program.name);

        self.write_imports(&mut code);
        code.push('\n');

        code.push_str("[nodes]\n");
        for node in &self.program.nodes {
            self.write_node(&mut code, node);
        }

        if !self.program.filters.is_empty() {
            code.push_str("\n[filters]\n");
            for filter in &self.program.filters {
                self.write_filter(&mut code, filter);
            }
        }

        tracing::debug!("[CODEGEN] Wrote program description ({} bytes)", code.len());
        code
    }

    fn write_imports(&self, code: &mut String) {
        code.push_str("[imports]\n");
        for section in self.program.imports.sections() {
            let items: Vec<String> = section
                .items
                .iter()
                .map(|item| match &item.alias {
                    Some(alias) => format!("{} as {}", item.identifier, alias),
                    None => item.identifier.clone(),
                })
                .collect();
            let _ = writeln!(code, "from \"{}\" use {}", section.location, items.join(", "));
        }
    }

    fn write_node(&self, code: &mut String, node: &NodeDescriptor) {
        let _ = writeln!(code, "node {} ({}) = {}", node.name, node.id, node.behavior);
        for input in &node.inputs {
            if input.channel {
                let _ = writeln!(code, "    in {} (channel)", input.name);
            } else {
                let _ = writeln!(code, "    in {}", input.name);
            }
        }
        write_rows(code, &node.outputs);
    }

    fn write_filter(&self, code: &mut String, filter: &FilterDescriptor) {
        let _ = writeln!(code, "filter {} ({}) = {}", filter.name, filter.bus, filter.filter);
        write_rows(code, &filter.rows);
    }
}

fn write_rows(code: &mut String, rows: &[OutputRow]) {
    for row in rows {
        let _ = writeln!(code, "    out {}", row);
    }
}
