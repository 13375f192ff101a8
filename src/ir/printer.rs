// Textual and DOT dumps of the IR. These are diagnostic aids: nothing in the pipeline
// depends on the output format. Blocks are printed in a breadth-first walk from the
// entry so unreachable blocks never show up, matching what the analyses see. When
// dominator or frontier results are supplied, each block is annotated with its idom
// and frontier set.

//! IR printing.

use std::fmt::Write;

use hashbrown::HashSet;

use super::dot::{escape_label, DotGraph};
use super::graph::{BlockRef, FuncRef, InstKind, InstRef, IrContext, ValueKind, ValueRef};
use crate::analysis::dominators::Dominators;
use crate::analysis::frontiers::DominanceFrontiers;
use crate::core::session::CompilationSession;

/// Optional analysis results to annotate block dumps with.
#[derive(Default)]
pub struct PrintAnnotations<'a> {
    pub doms: Option<&'a Dominators>,
    pub frontiers: Option<&'a DominanceFrontiers>,
}

/// Render a whole function in the `%name = op ...` style.
pub fn print_function<'arena>(
    ctx: &mut IrContext<'arena>,
    session: &CompilationSession<'arena>,
    func: FuncRef,
    annotations: &PrintAnnotations<'_>,
) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{} function {}",
        ctx.function_return_type(func).name(),
        ctx.function_name(func)
    )
    .unwrap();

    for block in reachable_blocks(ctx, func) {
        out.push_str(&block_text(ctx, session, block, false, annotations));
        out.push('\n');
    }
    out
}

/// Blocks reachable from the entry in breadth-first order.
fn reachable_blocks<'arena>(ctx: &IrContext<'arena>, func: FuncRef) -> Vec<BlockRef> {
    let mut order = Vec::new();
    let mut visited: HashSet<BlockRef> = HashSet::new();
    let mut to_visit: Vec<BlockRef> = ctx.entry_block(func).into_iter().collect();

    while !to_visit.is_empty() {
        let mut next_visit = Vec::new();
        for block in to_visit {
            if !visited.insert(block) {
                continue;
            }
            order.push(block);
            for succ in ctx.successors(block) {
                next_visit.push(succ);
            }
        }
        to_visit = next_visit;
    }
    order
}

fn block_text<'arena>(
    ctx: &mut IrContext<'arena>,
    session: &CompilationSession<'arena>,
    block: BlockRef,
    dot: bool,
    annotations: &PrintAnnotations<'_>,
) -> String {
    // DOT labels need \l instead of real newlines.
    let newline = if dot { "\\l" } else { "\n" };
    let mut out = String::new();

    let block_value = ctx.block_value(block);
    let block_name = ctx.get_or_assign_name(session, block_value).to_string();
    write!(out, "!{}:{}", block_name, newline).unwrap();

    if let Some(doms) = annotations.doms {
        if doms.is_reachable(block) {
            let idom = doms.idom(block);
            let idom_value = ctx.block_value(idom);
            let idom_name = ctx.get_or_assign_name(session, idom_value);
            write!(out, "// idom[!{}] = !{}{}", block_name, idom_name, newline).unwrap();
        }
    }

    if let Some(frontiers) = annotations.frontiers {
        let frontier: Vec<BlockRef> = frontiers.frontier(block).to_vec();
        write!(out, "// df[!{}] = [", block_name).unwrap();
        for (i, &df_block) in frontier.iter().enumerate() {
            let df_value = ctx.block_value(df_block);
            let df_name = ctx.get_or_assign_name(session, df_value);
            if i != 0 {
                out.push_str(", ");
            }
            write!(out, "!{}", df_name).unwrap();
        }
        write!(out, "]{}", newline).unwrap();
    }

    for &inst in ctx.block_insts(block).to_vec().iter() {
        out.push_str("  ");
        out.push_str(&inst_text(ctx, session, inst));
        out.push_str(newline);
    }
    out
}

fn value_text<'arena>(
    ctx: &mut IrContext<'arena>,
    session: &CompilationSession<'arena>,
    value: ValueRef,
) -> String {
    match ctx.value_kind(value) {
        ValueKind::Constant(n) => n.to_string(),
        ValueKind::Block(_) => format!("!{}", ctx.get_or_assign_name(session, value)),
        _ => format!("%{}", ctx.get_or_assign_name(session, value)),
    }
}

fn inst_text<'arena>(
    ctx: &mut IrContext<'arena>,
    session: &CompilationSession<'arena>,
    inst: InstRef,
) -> String {
    let mut out = String::new();

    if let Some(result) = ctx.inst_result(inst) {
        let name = ctx.get_or_assign_name(session, result);
        write!(out, "%{} = ", name).unwrap();
    }

    match ctx.inst_kind(inst) {
        InstKind::LoadVar(var) => {
            write!(out, "load_var {}", ctx.var_name(var)).unwrap();
        }
        InstKind::AssignVar(var) => {
            let operand = ctx.operand(inst, 0).expect("assign_var operand unset");
            let text = value_text(ctx, session, operand);
            write!(out, "assign_var {}, {}", ctx.var_name(var), text).unwrap();
        }
        InstKind::Binary(op) => {
            let lhs = ctx.operand(inst, 0).expect("binary lhs unset");
            let rhs = ctx.operand(inst, 1).expect("binary rhs unset");
            let lhs_text = value_text(ctx, session, lhs);
            let rhs_text = value_text(ctx, session, rhs);
            write!(out, "{} {}, {}", op.name(), lhs_text, rhs_text).unwrap();
        }
        InstKind::Jump => {
            let target = ctx.operand(inst, 0).expect("jump target unset");
            let text = value_text(ctx, session, target);
            write!(out, "jump {}", text).unwrap();
        }
        InstKind::CondJump => {
            let then_v = ctx.operand(inst, 0).expect("cond_jump then unset");
            let else_v = ctx.operand(inst, 1).expect("cond_jump else unset");
            let cond = ctx.operand(inst, 2).expect("cond_jump cond unset");
            let cond_text = value_text(ctx, session, cond);
            let then_text = value_text(ctx, session, then_v);
            let else_text = value_text(ctx, session, else_v);
            write!(out, "jump_cond {}, {}, {}", cond_text, then_text, else_text).unwrap();
        }
        InstKind::Return => {
            out.push_str("ret");
            if ctx.operand_count(inst) == 1 {
                let value = ctx.operand(inst, 0).expect("return operand unset");
                let text = value_text(ctx, session, value);
                write!(out, " {}", text).unwrap();
            }
        }
        InstKind::Call(callee) => {
            write!(out, "call @{}", ctx.function_name(callee)).unwrap();
            for slot in 0..ctx.operand_count(inst) {
                let arg = ctx.operand(inst, slot).expect("call argument unset");
                let text = value_text(ctx, session, arg);
                write!(out, "{}{}", if slot == 0 { " " } else { ", " }, text).unwrap();
            }
        }
        InstKind::Phi => {
            out.push_str("phi");
            for (i, (block, value)) in ctx.phi_incomings(inst).into_iter().enumerate() {
                let block_value = ctx.block_value(block);
                let block_text = value_text(ctx, session, block_value);
                let val_text = value_text(ctx, session, value);
                write!(
                    out,
                    "{}[ {}, {} ]",
                    if i == 0 { " " } else { ", " },
                    block_text,
                    val_text
                )
                .unwrap();
            }
        }
    }
    out
}

/// DOT dump of a function's CFG, one rect node per block.
pub fn dump_cfg_dot<'arena>(
    ctx: &mut IrContext<'arena>,
    session: &CompilationSession<'arena>,
    func: FuncRef,
    annotations: &PrintAnnotations<'_>,
) -> String {
    let mut graph = DotGraph::new("function_graph", true);
    graph.set_node_props("node", "shape=rect");

    for block in reachable_blocks(ctx, func) {
        let text = block_text(ctx, session, block, true, annotations);
        let id = format!("b{}", block.index());
        graph.set_node_props(&id, &format!("label=\"{}\"", escape_label(&text)));
        for succ in ctx.successors(block).collect::<Vec<_>>() {
            graph.add_edge(&id, &format!("b{}", succ.index()));
        }
    }
    graph.finish()
}

/// DOT dump of the dominator tree.
pub fn dump_dom_tree_dot<'arena>(
    ctx: &mut IrContext<'arena>,
    session: &CompilationSession<'arena>,
    doms: &Dominators,
) -> String {
    let mut graph = DotGraph::new("dominator_tree", true);
    graph.set_node_props("node", "shape=rect");

    for number in 0..doms.block_count() {
        let block = doms.block(number);
        let block_value = ctx.block_value(block);
        let name = ctx.get_or_assign_name(session, block_value).to_string();
        let id = format!("b{}", block.index());
        graph.set_node_props(&id, &format!("label=\"!{}\"", escape_label(&name)));
        for child in doms.children(block).collect::<Vec<_>>() {
            graph.add_edge(&id, &format!("b{}", child.index()));
        }
    }
    graph.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::graph::{BinaryOp, DataType, InsertPos};
    use bumpalo::Bump;

    #[test]
    fn test_print_simple_function() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Int64);
        let entry = ctx.create_block(f);
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);
        let add = ctx.new_binary(BinaryOp::Add, one, two);
        ctx.insert_instruction(entry, add, InsertPos::Bottom);
        let add_value = ctx.inst_result(add).unwrap();
        let ret = ctx.new_return(Some(add_value));
        ctx.insert_instruction(entry, ret, InsertPos::Bottom);

        let out = print_function(&mut ctx, &session, f, &PrintAnnotations::default());
        assert!(out.contains("int64 function f"));
        assert!(out.contains("add 1, 2"));
        assert!(out.contains("ret %"));
    }

    #[test]
    fn test_cfg_dot_contains_edges() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let entry = ctx.create_block(f);
        let next = ctx.create_block(f);
        let jump = ctx.new_jump(next);
        ctx.insert_instruction(entry, jump, InsertPos::Bottom);
        let ret = ctx.new_return(None);
        ctx.insert_instruction(next, ret, InsertPos::Bottom);

        let out = dump_cfg_dot(&mut ctx, &session, f, &PrintAnnotations::default());
        assert!(out.starts_with("digraph function_graph {"));
        assert!(out.contains(&format!("b{} -> b{}", entry.index(), next.index())));
    }
}
