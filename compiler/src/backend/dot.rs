use std::fmt::Write as _;

use wiring_scenario::LifecycleRegistry;

use super::{Backend, BackendError};
use crate::WiredScenario;

#[derive(Clone, Copy, Debug, Default)]
pub struct DotBackend;

impl Backend for DotBackend {
    type Artifact = String;

    fn emit(&self, output: &WiredScenario) -> Result<Self::Artifact, BackendError> {
        Ok(render_dot(output.components()))
    }
}

/// Render wired components as a Graphviz DOT diagram, one cluster per domain.
///
/// Nodes are numbered by setup order. Edges run from the referenced component to the one
/// holding the reference; constructor dependencies are solid, setter references dashed.
pub fn render_dot(registry: &LifecycleRegistry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph wiring {{");
    let _ = writeln!(out, "  rankdir=LR;");

    let mut domains = Vec::new();
    for c in registry.iter() {
        if !domains.contains(&&c.domain) {
            domains.push(&c.domain);
        }
    }

    for domain in domains {
        write_indent(&mut out, 1);
        let _ = writeln!(out, "subgraph cluster_{domain} {{");
        write_indent(&mut out, 2);
        let _ = write!(out, "label=\"");
        write_escaped_label(&mut out, domain.as_str());
        let _ = writeln!(out, "\";");

        for (i, c) in registry.iter().enumerate() {
            if &c.domain != domain {
                continue;
            }
            write_indent(&mut out, 2);
            let _ = write!(out, "c{i} [label=\"");
            write_escaped_label(&mut out, &format!("{}\n{}", c.id, c.handle.class()));
            let _ = writeln!(out, "\"];");
        }

        write_indent(&mut out, 1);
        let _ = writeln!(out, "}}");
    }

    for (to, c) in registry.iter().enumerate() {
        for dep in &c.dependencies {
            let Some(from) = registry.position(dep.target.as_str()) else {
                continue;
            };
            write_indent(&mut out, 1);
            let _ = write!(out, "c{from} -> c{to} [label=\"");
            write_escaped_label(&mut out, dep.option.as_str());
            if dep.constructor {
                let _ = writeln!(out, "\"];");
            } else {
                let _ = writeln!(out, "\", style=dashed];");
            }
        }
    }

    let _ = writeln!(out, "}}");
    out
}

fn write_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("  ");
    }
}

fn write_escaped_label(out: &mut String, label: &str) {
    for ch in label.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
}
