//! Abstract syntax tree.
//!
//! A plain enum tree owned by the parser's caller. The IR builder walks it
//! once; the `dump` functions are diagnostic aids for the driver.

use std::fmt::Write;

use crate::ir::dot::{escape_label, DotGraph};
use crate::ir::graph::BinaryOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Void,
    Int64,
}

impl TypeName {
    pub fn name(self) -> &'static str {
        match self {
            TypeName::Void => "void",
            TypeName::Int64 => "int64",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(i64),
    Variable(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Declaration {
        name: String,
        init: Option<Expr>,
    },
    Assign {
        name: String,
        value: Expr,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    ExprStmt(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: TypeName,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    pub functions: Vec<FunctionDecl>,
}

/// Indented text dump of a module.
pub fn dump(module: &Module) -> String {
    let mut out = String::new();
    for function in &module.functions {
        writeln!(
            out,
            "function {} ({}) -> {}",
            function.name,
            function.params.join(", "),
            function.return_type.name()
        )
        .unwrap();
        for stmt in &function.body {
            dump_stmt(&mut out, stmt, 1);
        }
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn dump_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    indent(out, depth);
    match stmt {
        Stmt::Declaration { name, init } => {
            writeln!(out, "declaration {}", name).unwrap();
            if let Some(init) = init {
                dump_expr(out, init, depth + 1);
            }
        }
        Stmt::Assign { name, value } => {
            writeln!(out, "assign {}", name).unwrap();
            dump_expr(out, value, depth + 1);
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => {
            writeln!(out, "if").unwrap();
            dump_expr(out, cond, depth + 1);
            for stmt in then_body {
                dump_stmt(out, stmt, depth + 1);
            }
            if let Some(else_body) = else_body {
                indent(out, depth);
                writeln!(out, "else").unwrap();
                for stmt in else_body {
                    dump_stmt(out, stmt, depth + 1);
                }
            }
        }
        Stmt::While { cond, body } => {
            writeln!(out, "while").unwrap();
            dump_expr(out, cond, depth + 1);
            for stmt in body {
                dump_stmt(out, stmt, depth + 1);
            }
        }
        Stmt::Return(value) => {
            writeln!(out, "return").unwrap();
            if let Some(value) = value {
                dump_expr(out, value, depth + 1);
            }
        }
        Stmt::ExprStmt(expr) => {
            writeln!(out, "expr").unwrap();
            dump_expr(out, expr, depth + 1);
        }
    }
}

fn dump_expr(out: &mut String, expr: &Expr, depth: usize) {
    indent(out, depth);
    match expr {
        Expr::Number(n) => writeln!(out, "number {}", n).unwrap(),
        Expr::Variable(name) => writeln!(out, "variable {}", name).unwrap(),
        Expr::Binary { op, lhs, rhs } => {
            writeln!(out, "binary {}", op.name()).unwrap();
            dump_expr(out, lhs, depth + 1);
            dump_expr(out, rhs, depth + 1);
        }
        Expr::Call { name, args } => {
            writeln!(out, "call {}", name).unwrap();
            for arg in args {
                dump_expr(out, arg, depth + 1);
            }
        }
    }
}

/// Graphviz dump of the AST, one node per statement or expression.
pub fn dump_dot(module: &Module) -> String {
    let mut graph = DotGraph::new("ast", true);
    graph.set_node_props("node", "shape=rect");
    let mut counter = 0usize;

    for function in &module.functions {
        let id = fresh(&mut counter);
        graph.set_node_props(
            &id,
            &format!("label=\"function {}\"", escape_label(&function.name)),
        );
        for stmt in &function.body {
            let child = dot_stmt(&mut graph, &mut counter, stmt);
            graph.add_edge(&id, &child);
        }
    }
    graph.finish()
}

fn fresh(counter: &mut usize) -> String {
    let id = format!("n{}", *counter);
    *counter += 1;
    id
}

fn dot_node(graph: &mut DotGraph, counter: &mut usize, label: &str) -> String {
    let id = fresh(counter);
    graph.set_node_props(&id, &format!("label=\"{}\"", escape_label(label)));
    id
}

fn dot_stmt(graph: &mut DotGraph, counter: &mut usize, stmt: &Stmt) -> String {
    match stmt {
        Stmt::Declaration { name, init } => {
            let id = dot_node(graph, counter, &format!("declaration {}", name));
            if let Some(init) = init {
                let child = dot_expr(graph, counter, init);
                graph.add_edge(&id, &child);
            }
            id
        }
        Stmt::Assign { name, value } => {
            let id = dot_node(graph, counter, &format!("assign {}", name));
            let child = dot_expr(graph, counter, value);
            graph.add_edge(&id, &child);
            id
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => {
            let id = dot_node(graph, counter, "if");
            let cond_id = dot_expr(graph, counter, cond);
            graph.add_edge(&id, &cond_id);
            for stmt in then_body {
                let child = dot_stmt(graph, counter, stmt);
                graph.add_edge(&id, &child);
            }
            for stmt in else_body.iter().flatten() {
                let child = dot_stmt(graph, counter, stmt);
                graph.add_edge(&id, &child);
            }
            id
        }
        Stmt::While { cond, body } => {
            let id = dot_node(graph, counter, "while");
            let cond_id = dot_expr(graph, counter, cond);
            graph.add_edge(&id, &cond_id);
            for stmt in body {
                let child = dot_stmt(graph, counter, stmt);
                graph.add_edge(&id, &child);
            }
            id
        }
        Stmt::Return(value) => {
            let id = dot_node(graph, counter, "return");
            if let Some(value) = value {
                let child = dot_expr(graph, counter, value);
                graph.add_edge(&id, &child);
            }
            id
        }
        Stmt::ExprStmt(expr) => dot_expr(graph, counter, expr),
    }
}

fn dot_expr(graph: &mut DotGraph, counter: &mut usize, expr: &Expr) -> String {
    match expr {
        Expr::Number(n) => dot_node(graph, counter, &format!("number {}", n)),
        Expr::Variable(name) => dot_node(graph, counter, &format!("variable {}", name)),
        Expr::Binary { op, lhs, rhs } => {
            let id = dot_node(graph, counter, op.name());
            let lhs_id = dot_expr(graph, counter, lhs);
            let rhs_id = dot_expr(graph, counter, rhs);
            graph.add_edge(&id, &lhs_id);
            graph.add_edge(&id, &rhs_id);
            id
        }
        Expr::Call { name, args } => {
            let id = dot_node(graph, counter, &format!("call {}", name));
            for arg in args {
                let child = dot_expr(graph, counter, arg);
                graph.add_edge(&id, &child);
            }
            id
        }
    }
}
