//! Tiny Graphviz DOT builder used by the diagnostic dumps.
//!
//! Nodes are registered with raw property strings and edges as id pairs;
//! `finish` renders the graph source. Passing the pseudo-node `node` sets
//! default properties for all nodes, the usual DOT trick.

use std::fmt::Write;

pub struct DotGraph {
    name: String,
    directed: bool,
    node_props: Vec<(String, String)>,
    edges: Vec<(String, String)>,
}

impl DotGraph {
    pub fn new(name: &str, directed: bool) -> Self {
        Self {
            name: name.to_string(),
            directed,
            node_props: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Attach a raw property string to a node, e.g. `shape=rect` or
    /// `label="..."`.
    pub fn set_node_props(&mut self, node: &str, props: &str) {
        self.node_props.push((node.to_string(), props.to_string()));
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges.push((from.to_string(), to.to_string()));
    }

    pub fn finish(self) -> String {
        let mut out = String::new();
        let keyword = if self.directed { "digraph" } else { "graph" };
        let arrow = if self.directed { "->" } else { "--" };
        writeln!(out, "{} {} {{", keyword, self.name).unwrap();
        for (node, props) in &self.node_props {
            writeln!(out, "    {} [{}]", node, props).unwrap();
        }
        for (from, to) in &self.edges {
            writeln!(out, "    {} {} {}", from, arrow, to).unwrap();
        }
        writeln!(out, "}}").unwrap();
        out
    }
}

/// Escape a string for use inside a double-quoted DOT label.
pub fn escape_label(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
