// This module converts non-SSA IR into SSA form. Before conversion a logical variable
// is an integer id written by AssignVar and read by LoadVar pseudo-instructions; after
// conversion those instructions are gone and every read has been rewired to a concrete
// value, with phi nodes at control-flow joins where different definitions meet.
//
// The pass runs in three phases over a finished dominator analysis:
//   1) per-block scan recording, for each variable, the ordered load/assign list and
//      the last assignment in the block (only the last one can escape the block);
//   2) worklist-driven phi placement at iterated dominance frontiers, one variable at
//      a time, where every created phi is itself a new definition that may need
//      further frontier propagation;
//   3) a renaming DFS over the dominator tree maintaining a stack of reaching values
//      per variable, with the invariant that stack depth on block entry equals stack
//      depth after the block's subtree fully returns.
//
// Phase 2 marks frontier blocks with the index of the variable that last touched them;
// variables are processed strictly one at a time from a single worklist, so the
// markers can never alias across variables. A load whose variable stack is empty means
// the source read a variable no assignment reaches; that is reported as an error
// naming the variable rather than a crash.

//! SSA construction: phi insertion and renaming.

use hashbrown::HashMap;

use crate::analysis::dominators::Dominators;
use crate::analysis::frontiers::DominanceFrontiers;
use crate::core::error::{CompileError, CompileResult};
use crate::core::session::CompilationSession;
use crate::ir::graph::{BlockRef, FuncRef, InsertPos, InstKind, InstRef, IrContext, ValueRef, VarId};

/// Per-block bookkeeping for the conversion.
#[derive(Default)]
struct BlockInfo {
    /// Load and assign instructions in original program order.
    load_assigns: Vec<InstRef>,
    /// Phis created for this block, one per variable, in creation order.
    phis: Vec<(VarId, InstRef)>,
    /// Variable to index into `phis`.
    phi_map: HashMap<VarId, usize>,
    /// Re-entry guard for the renaming DFS.
    renamed: bool,
}

/// Per-variable bookkeeping across blocks.
struct VarEntry {
    var: VarId,
    /// Last assignment per block that assigns this variable, with the
    /// block's postorder number.
    assigns: Vec<(InstRef, usize)>,
}

/// Convert `func` to SSA form in place.
///
/// The dominator analysis and frontiers must be current for the function's
/// CFG. After conversion no `LoadVar`/`AssignVar` instruction remains
/// reachable from the entry, and phis that ended up unused are removed.
pub fn ssa_convert<'arena>(
    ctx: &mut IrContext<'arena>,
    session: &CompilationSession<'arena>,
    func: FuncRef,
    doms: &Dominators,
    frontiers: &DominanceFrontiers,
) -> CompileResult<()> {
    let Some(entry) = doms.entry() else {
        return Ok(());
    };
    debug_assert_eq!(ctx.entry_block(func), Some(entry));

    let count = doms.block_count();
    let mut block_info: Vec<BlockInfo> = (0..count).map(|_| BlockInfo::default()).collect();

    // ---- Phase 1: scan blocks for variable activity. ----
    let mut vars: Vec<VarEntry> = Vec::new();
    let mut var_index: HashMap<VarId, usize> = HashMap::new();
    // Value stacks for the renaming phase; an entry per variable seen.
    let mut stacks: HashMap<VarId, Vec<ValueRef>> = HashMap::new();

    for number in 0..count {
        let block = doms.block(number);
        // First touch order within the block, and the last assignment each
        // variable received here.
        let mut local_order: Vec<VarId> = Vec::new();
        let mut local_last: HashMap<VarId, InstRef> = HashMap::new();

        for &inst in ctx.block_insts(block) {
            let var = match ctx.inst_kind(inst) {
                InstKind::LoadVar(var) => var,
                InstKind::AssignVar(var) => {
                    local_last.insert(var, inst);
                    var
                }
                _ => continue,
            };
            if !local_order.contains(&var) {
                local_order.push(var);
            }
            block_info[number].load_assigns.push(inst);
        }

        for var in local_order {
            let index = *var_index.entry(var).or_insert_with(|| {
                vars.push(VarEntry {
                    var,
                    assigns: Vec::new(),
                });
                stacks.insert(var, Vec::new());
                vars.len() - 1
            });
            if let Some(&assign) = local_last.get(&var) {
                vars[index].assigns.push((assign, number));
            }
        }
    }

    // ---- Phase 2: place phis at iterated dominance frontiers. ----
    // Marker per block: index of the variable that last touched it.
    let mut last_touched = vec![usize::MAX; count];

    for (var_number, entry_info) in vars.iter().enumerate() {
        let var = entry_info.var;
        // Worklist of (definition value, defining block number) pairs.
        let mut worklist: Vec<(ValueRef, usize)> = Vec::new();
        for &(assign, number) in &entry_info.assigns {
            last_touched[number] = var_number;
            let value = ctx.operand(assign, 0).expect("assign operand unset");
            worklist.push((value, number));
        }

        let mut next = 0;
        while next < worklist.len() {
            let (value, number) = worklist[next];
            next += 1;
            let defining_block = doms.block(number);

            for &frontier_block in frontiers.frontier(defining_block) {
                let frontier_number = doms.number(frontier_block);
                let ty = ctx.value_type(value);
                let phi = get_or_create_phi(
                    ctx,
                    session,
                    &mut block_info[frontier_number],
                    frontier_block,
                    var,
                    ty,
                );
                // Only a real CFG edge can carry the value. A definition
                // reaches its iterated frontier through intermediate blocks
                // too; those edges are filled in by the renaming pass.
                if ctx.predecessors(frontier_block).any(|p| p == defining_block) {
                    ctx.phi_insert_incoming(phi, defining_block, value);
                }

                // A new phi is a new definition; propagate it once.
                if last_touched[frontier_number] != var_number {
                    last_touched[frontier_number] = var_number;
                    let phi_value = ctx.inst_result(phi).expect("phi has a result");
                    worklist.push((phi_value, frontier_number));
                }
            }
        }
    }

    // ---- Phase 3: rename via a DFS over the dominator tree. ----
    rename(ctx, doms, &mut block_info, &mut stacks, entry)?;

    // Every push must have been popped on the way back up.
    for (var, stack) in &stacks {
        assert!(
            stack.is_empty(),
            "value stack for `{}` is unbalanced after renaming",
            ctx.var_name(*var)
        );
    }

    // Phis nothing ended up reading are dead on arrival.
    let mut dead = 0usize;
    for info in &block_info {
        for &(_, phi) in &info.phis {
            let result = ctx.inst_result(phi).expect("phi has a result");
            if ctx.value_uses(result).is_empty() {
                ctx.remove_instruction(phi);
                ctx.clear_operand_uses(phi);
                dead += 1;
            }
        }
    }
    log::debug!(
        "ssa: `{}` converted, {} variables, {} dead phis removed",
        ctx.function_name(func),
        vars.len(),
        dead
    );

    Ok(())
}

fn get_or_create_phi<'arena>(
    ctx: &mut IrContext<'arena>,
    session: &CompilationSession<'arena>,
    info: &mut BlockInfo,
    block: BlockRef,
    var: VarId,
    ty: crate::ir::graph::DataType,
) -> InstRef {
    if let Some(&index) = info.phi_map.get(&var) {
        return info.phis[index].1;
    }
    let phi = ctx.new_phi(ty);
    ctx.insert_instruction(block, phi, InsertPos::Top);
    session.record_phi_inserted();
    info.phi_map.insert(var, info.phis.len());
    info.phis.push((var, phi));
    phi
}

/// Rename one block and its dominator-tree subtree.
///
/// Safe to call with any start block: a block that was already renamed
/// returns immediately.
fn rename<'arena>(
    ctx: &mut IrContext<'arena>,
    doms: &Dominators,
    block_info: &mut [BlockInfo],
    stacks: &mut HashMap<VarId, Vec<ValueRef>>,
    current: BlockRef,
) -> CompileResult<()> {
    let number = doms.number(current);
    if block_info[number].renamed {
        return Ok(());
    }
    block_info[number].renamed = true;

    let phis = block_info[number].phis.clone();
    let load_assigns = block_info[number].load_assigns.clone();

    // A phi is a definition visible to the whole subtree.
    for &(var, phi) in &phis {
        let value = ctx.inst_result(phi).expect("phi has a result");
        stacks
            .get_mut(&var)
            .expect("phi for an unseen variable")
            .push(value);
    }

    // Renaming within the block, in original order.
    for &inst in &load_assigns {
        match ctx.inst_kind(inst) {
            InstKind::LoadVar(var) => {
                let reaching = stacks
                    .get(&var)
                    .and_then(|stack| stack.last())
                    .copied()
                    .ok_or_else(|| CompileError::UseBeforeDef {
                        name: ctx.var_name(var).to_string(),
                    })?;
                let result = ctx.inst_result(inst).expect("load has a result");
                ctx.replace_all_uses(result, reaching);
                ctx.remove_instruction(inst);
            }
            InstKind::AssignVar(var) => {
                let value = ctx.operand(inst, 0).expect("assign operand unset");
                stacks
                    .get_mut(&var)
                    .expect("assign for an unseen variable")
                    .push(value);
                ctx.remove_instruction(inst);
            }
            _ => unreachable!("only loads and assigns are recorded"),
        }
    }

    // Feed the phis of successor blocks with the current reaching values.
    for succ in ctx.successors(current).collect::<Vec<_>>() {
        let succ_number = doms.number(succ);
        for &(var, phi) in &block_info[succ_number].phis.clone() {
            let Some(&reaching) = stacks.get(&var).and_then(|stack| stack.last()) else {
                // No value on this path; the phi keeps only the edges that
                // carry one.
                continue;
            };
            ctx.phi_insert_incoming(phi, current, reaching);
        }
    }

    // Visit dominated blocks.
    for child in doms.children(current).collect::<Vec<_>>() {
        rename(ctx, doms, block_info, stacks, child)?;
    }

    // Pop exactly what this block pushed, one per local assign and one per
    // phi. Order does not matter.
    for &inst in &load_assigns {
        if let InstKind::AssignVar(var) = ctx.inst_kind(inst) {
            let stack = stacks.get_mut(&var).expect("assign for an unseen variable");
            stack.pop().expect("unbalanced value stack");
        }
    }
    for &(var, _) in &phis {
        let stack = stacks.get_mut(&var).expect("phi for an unseen variable");
        stack.pop().expect("unbalanced value stack");
    }

    Ok(())
}
