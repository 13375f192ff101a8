// Dominance frontier computation over a finished dominator analysis. For each block b,
// every predecessor starts a runner that walks the idom chain upward; b belongs to the
// frontier of every block the runner visits strictly below idom(b). This is the
// standard placement set for phi nodes: the frontier of a definition's block is where
// its dominance stops holding.

//! Dominance frontiers.

use hashbrown::HashMap;

use super::dominators::Dominators;
use crate::ir::graph::{BlockRef, IrContext};

/// Block to dominance-frontier map. Owned separately from [`Dominators`] and
/// invalidated by any CFG mutation, like the dominator tree itself.
pub struct DominanceFrontiers {
    frontiers: HashMap<BlockRef, Vec<BlockRef>>,
}

impl DominanceFrontiers {
    /// Compute frontiers for every reachable block.
    pub fn compute(ctx: &IrContext<'_>, doms: &Dominators) -> Self {
        let mut frontiers: HashMap<BlockRef, Vec<BlockRef>> = HashMap::new();

        for number in 0..doms.block_count() {
            let block = doms.block(number);
            let idom_number = doms.idom_number(number);

            for pred in ctx.predecessors(block) {
                let Some(mut runner) = doms.try_number(pred) else {
                    // An edge from a block the entry cannot reach contributes
                    // nothing.
                    continue;
                };
                while runner != idom_number {
                    let runner_block = doms.block(runner);
                    let list = frontiers.entry(runner_block).or_default();
                    if !list.contains(&block) {
                        list.push(block);
                    }
                    runner = doms.idom_number(runner);
                }
            }
        }

        Self { frontiers }
    }

    /// Dominance frontier of `block`. Empty for blocks with no frontier.
    pub fn frontier(&self, block: BlockRef) -> &[BlockRef] {
        self.frontiers.get(&block).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::CompilationSession;
    use crate::ir::graph::{DataType, InsertPos, IrContext};
    use bumpalo::Bump;

    #[test]
    fn test_diamond_frontiers() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let f = ctx.new_function(&session, "f", DataType::Void);

        let entry = ctx.create_block(f);
        let a = ctx.create_block(f);
        let b = ctx.create_block(f);
        let join = ctx.create_block(f);

        let cond = ctx.const_int(1);
        let br = ctx.new_cond_jump(a, b, cond);
        ctx.insert_instruction(entry, br, InsertPos::Bottom);
        let j1 = ctx.new_jump(join);
        ctx.insert_instruction(a, j1, InsertPos::Bottom);
        let j2 = ctx.new_jump(join);
        ctx.insert_instruction(b, j2, InsertPos::Bottom);
        let ret = ctx.new_return(None);
        ctx.insert_instruction(join, ret, InsertPos::Bottom);

        let doms = Dominators::compute(&ctx, f);
        let df = DominanceFrontiers::compute(&ctx, &doms);

        assert_eq!(df.frontier(a), &[join]);
        assert_eq!(df.frontier(b), &[join]);
        assert!(df.frontier(entry).is_empty());
        assert!(df.frontier(join).is_empty());
    }

    #[test]
    fn test_loop_header_in_own_frontier() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let f = ctx.new_function(&session, "f", DataType::Void);

        let entry = ctx.create_block(f);
        let header = ctx.create_block(f);
        let body = ctx.create_block(f);
        let exit = ctx.create_block(f);

        let j = ctx.new_jump(header);
        ctx.insert_instruction(entry, j, InsertPos::Bottom);
        let cond = ctx.const_int(1);
        let br = ctx.new_cond_jump(body, exit, cond);
        ctx.insert_instruction(header, br, InsertPos::Bottom);
        let back = ctx.new_jump(header);
        ctx.insert_instruction(body, back, InsertPos::Bottom);
        let ret = ctx.new_return(None);
        ctx.insert_instruction(exit, ret, InsertPos::Bottom);

        let doms = Dominators::compute(&ctx, f);
        let df = DominanceFrontiers::compute(&ctx, &doms);

        // The back edge puts the header in its own frontier and in the
        // body's frontier.
        assert_eq!(df.frontier(header), &[header]);
        assert_eq!(df.frontier(body), &[header]);
    }
}
