// This module computes dominator information for a function using the iterative
// algorithm of Cooper, Harvey and Kennedy ("A Simple, Fast Dominance Algorithm").
// Blocks are numbered in postorder, the entry receiving the highest number; the
// fixpoint loop then processes blocks entry-first (reverse postorder) and intersects
// the known dominators of each block's predecessors until nothing changes. The
// processing order is what makes the intersection walk terminate: along convergent
// paths a dominator always has a number at least as high as its dominatee, so
// intersect() can walk the smaller-numbered side upward. Unreachable blocks are never
// numbered and are absent from every query. The result is owned by the caller and is
// invalidated by any CFG mutation.

//! Dominator tree computation.

use hashbrown::{HashMap, HashSet};

use crate::ir::graph::{BlockRef, FuncRef, IrContext};

const UNDEFINED: usize = usize::MAX;

/// Dominator analysis result: postorder numbering, immediate dominators and
/// the dominator tree.
pub struct Dominators {
    /// Reachable blocks indexed by postorder number.
    postorder: Vec<BlockRef>,
    /// Block to postorder number.
    number: HashMap<BlockRef, usize>,
    /// Immediate dominator, as a postorder number, per postorder number.
    /// The entry is its own dominator.
    doms: Vec<usize>,
    /// Dominator tree children, as postorder numbers, per postorder number.
    children: Vec<Vec<usize>>,
}

impl Dominators {
    /// Compute dominators for all blocks reachable from `func`'s entry.
    pub fn compute(ctx: &IrContext<'_>, func: FuncRef) -> Self {
        let (postorder, number) = Self::build_postorder(ctx, func);
        let count = postorder.len();

        let mut doms = vec![UNDEFINED; count];
        if count > 0 {
            doms[count - 1] = count - 1; // entry dominates itself
        }

        let mut changed = true;
        while changed {
            changed = false;
            // Entry first: highest postorder number down to the lowest.
            for i in (0..count.saturating_sub(1)).rev() {
                let block = postorder[i];
                let mut new_dom = UNDEFINED;
                for pred in ctx.predecessors(block) {
                    let Some(&pred_number) = number.get(&pred) else {
                        // Unreachable predecessor, not part of the analysis.
                        continue;
                    };
                    if doms[pred_number] == UNDEFINED {
                        continue;
                    }
                    new_dom = if new_dom == UNDEFINED {
                        pred_number
                    } else {
                        Self::intersect(&doms, pred_number, new_dom)
                    };
                }
                if new_dom != UNDEFINED && doms[i] != new_dom {
                    doms[i] = new_dom;
                    changed = true;
                }
            }
        }

        let mut children = vec![Vec::new(); count];
        for i in 0..count {
            let idom = doms[i];
            if idom != UNDEFINED && idom != i {
                children[idom].push(i);
            }
        }

        log::debug!(
            "dominators: {} reachable blocks in `{}`",
            count,
            ctx.function_name(func)
        );

        Self {
            postorder,
            number,
            doms,
            children,
        }
    }

    /// Postorder numbering via an explicit-stack DFS. A block receives its
    /// number only after all of its successors have been numbered, so the
    /// entry ends up with the highest number.
    fn build_postorder(
        ctx: &IrContext<'_>,
        func: FuncRef,
    ) -> (Vec<BlockRef>, HashMap<BlockRef, usize>) {
        let mut postorder = Vec::new();
        let mut number = HashMap::new();

        let Some(entry) = ctx.entry_block(func) else {
            return (postorder, number);
        };

        let mut visited: HashSet<BlockRef> = HashSet::new();
        let mut stack = vec![(entry, false)];
        while let Some((block, processed)) = stack.pop() {
            if processed {
                number.insert(block, postorder.len());
                postorder.push(block);
                continue;
            }
            if !visited.insert(block) {
                continue;
            }
            stack.push((block, true));
            for succ in ctx.successors(block) {
                if !visited.contains(&succ) {
                    stack.push((succ, false));
                }
            }
        }
        (postorder, number)
    }

    /// Walk the smaller-numbered side up the dominator array until both
    /// sides meet.
    fn intersect(doms: &[usize], mut a: usize, mut b: usize) -> usize {
        while a != b {
            while a < b {
                a = doms[a];
            }
            while b < a {
                b = doms[b];
            }
        }
        a
    }

    /// Number of reachable blocks.
    pub fn block_count(&self) -> usize {
        self.postorder.len()
    }

    /// Block for a postorder number.
    pub fn block(&self, number: usize) -> BlockRef {
        self.postorder[number]
    }

    /// Postorder number of a reachable block.
    ///
    /// Panics if the block was unreachable when the analysis ran; use
    /// [`Dominators::try_number`] to probe.
    pub fn number(&self, block: BlockRef) -> usize {
        self.try_number(block)
            .expect("block is unreachable or the analysis is stale")
    }

    pub fn try_number(&self, block: BlockRef) -> Option<usize> {
        self.number.get(&block).copied()
    }

    pub fn is_reachable(&self, block: BlockRef) -> bool {
        self.number.contains_key(&block)
    }

    /// Immediate dominator of `block`. The entry is its own dominator.
    pub fn idom(&self, block: BlockRef) -> BlockRef {
        self.postorder[self.doms[self.number(block)]]
    }

    /// Immediate dominator in postorder-number space.
    pub(crate) fn idom_number(&self, number: usize) -> usize {
        self.doms[number]
    }

    /// Children of `block` in the dominator tree.
    pub fn children(&self, block: BlockRef) -> impl Iterator<Item = BlockRef> + '_ {
        self.children[self.number(block)]
            .iter()
            .map(move |&i| self.postorder[i])
    }

    /// Entry block, if the function had any reachable blocks.
    pub fn entry(&self) -> Option<BlockRef> {
        self.postorder.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::CompilationSession;
    use crate::ir::graph::{DataType, InsertPos, IrContext};
    use bumpalo::Bump;

    fn jump(ctx: &mut IrContext<'_>, from: BlockRef, to: BlockRef) {
        let j = ctx.new_jump(to);
        ctx.insert_instruction(from, j, InsertPos::Bottom);
    }

    #[test]
    fn test_straight_chain() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let f = ctx.new_function(&session, "f", DataType::Void);

        let blocks: Vec<_> = (0..5).map(|_| ctx.create_block(f)).collect();
        for window in blocks.windows(2) {
            jump(&mut ctx, window[0], window[1]);
        }
        let ret = ctx.new_return(None);
        ctx.insert_instruction(blocks[4], ret, InsertPos::Bottom);

        let doms = Dominators::compute(&ctx, f);
        assert_eq!(doms.block_count(), 5);
        for k in 1..5 {
            assert_eq!(doms.idom(blocks[k]), blocks[k - 1]);
        }
        assert_eq!(doms.idom(blocks[0]), blocks[0]);
    }

    #[test]
    fn test_diamond_idom() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let f = ctx.new_function(&session, "f", DataType::Void);

        let entry = ctx.create_block(f);
        let a = ctx.create_block(f);
        let b = ctx.create_block(f);
        let exit = ctx.create_block(f);

        let cond = ctx.const_int(1);
        let br = ctx.new_cond_jump(a, b, cond);
        ctx.insert_instruction(entry, br, InsertPos::Bottom);
        jump(&mut ctx, a, exit);
        jump(&mut ctx, b, exit);
        let ret = ctx.new_return(None);
        ctx.insert_instruction(exit, ret, InsertPos::Bottom);

        let doms = Dominators::compute(&ctx, f);
        assert_eq!(doms.idom(exit), entry);
        assert_eq!(doms.idom(a), entry);
        assert_eq!(doms.idom(b), entry);

        let mut entry_children: Vec<_> = doms.children(entry).collect();
        entry_children.sort();
        let mut expected = vec![a, b, exit];
        expected.sort();
        assert_eq!(entry_children, expected);
    }

    #[test]
    fn test_loop_idom() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let f = ctx.new_function(&session, "f", DataType::Void);

        let entry = ctx.create_block(f);
        let header = ctx.create_block(f);
        let body = ctx.create_block(f);
        let exit = ctx.create_block(f);

        jump(&mut ctx, entry, header);
        let cond = ctx.const_int(1);
        let br = ctx.new_cond_jump(body, exit, cond);
        ctx.insert_instruction(header, br, InsertPos::Bottom);
        jump(&mut ctx, body, header); // back edge
        let ret = ctx.new_return(None);
        ctx.insert_instruction(exit, ret, InsertPos::Bottom);

        let doms = Dominators::compute(&ctx, f);
        assert_eq!(doms.idom(header), entry);
        assert_eq!(doms.idom(body), header);
        assert_eq!(doms.idom(exit), header);
    }

    #[test]
    fn test_unreachable_block_excluded() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let f = ctx.new_function(&session, "f", DataType::Void);

        let entry = ctx.create_block(f);
        let orphan = ctx.create_block(f);
        let ret = ctx.new_return(None);
        ctx.insert_instruction(entry, ret, InsertPos::Bottom);
        let ret2 = ctx.new_return(None);
        ctx.insert_instruction(orphan, ret2, InsertPos::Bottom);

        let doms = Dominators::compute(&ctx, f);
        assert_eq!(doms.block_count(), 1);
        assert!(doms.is_reachable(entry));
        assert!(!doms.is_reachable(orphan));
    }

    #[test]
    fn test_empty_function() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let f = ctx.new_function(&session, "f", DataType::Void);

        let doms = Dominators::compute(&ctx, f);
        assert_eq!(doms.block_count(), 0);
        assert!(doms.entry().is_none());
    }
}
