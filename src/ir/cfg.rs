// Successor and predecessor views over the IR graph. Neither direction is stored:
// successors are derived from the block-typed operands of a block's terminator, and
// predecessors from the use-list of the block's own value, filtered to uses owned by
// terminator instructions. Both iterators are lazy, single-pass views of the live
// graph; mutating the graph while one is open is out of contract.

//! CFG edge iterators derived from terminators and use-lists.

use super::graph::{BlockRef, InstKind, InstRef, IrContext, UseRef, ValueKind};

impl<'arena> IrContext<'arena> {
    /// Successor blocks, read off the terminator's block-typed operands.
    ///
    /// Blocks should end with a jump or a return; a phi in terminator
    /// position is tolerated and yields no successors.
    pub fn successors<'a>(&'a self, block: BlockRef) -> Successors<'a, 'arena> {
        let inst = self.last_instruction(block).filter(|&i| {
            !matches!(self.inst_kind(i), InstKind::Phi)
        });
        Successors {
            ctx: self,
            inst,
            slot: 0,
        }
    }

    /// Predecessor blocks, read off the block value's use-list. Each use
    /// owned by a terminator contributes the owning instruction's parent.
    pub fn predecessors<'a>(&'a self, block: BlockRef) -> Predecessors<'a, 'arena> {
        Predecessors {
            ctx: self,
            uses: self.value_uses(self.block_value(block)),
            index: 0,
        }
    }

    /// Number of predecessors. Convenience over the iterator.
    pub fn predecessor_count(&self, block: BlockRef) -> usize {
        self.predecessors(block).count()
    }
}

/// Lazy successor iterator. See [`IrContext::successors`].
pub struct Successors<'a, 'arena> {
    ctx: &'a IrContext<'arena>,
    inst: Option<InstRef>,
    slot: usize,
}

impl<'a, 'arena> Iterator for Successors<'a, 'arena> {
    type Item = BlockRef;

    fn next(&mut self) -> Option<BlockRef> {
        let inst = self.inst?;
        while self.slot < self.ctx.operand_count(inst) {
            let slot = self.slot;
            self.slot += 1;
            if let Some(value) = self.ctx.operand(inst, slot) {
                if let ValueKind::Block(b) = self.ctx.value_kind(value) {
                    return Some(b);
                }
            }
        }
        None
    }
}

/// Lazy predecessor iterator. See [`IrContext::predecessors`].
pub struct Predecessors<'a, 'arena> {
    ctx: &'a IrContext<'arena>,
    uses: &'a [UseRef],
    index: usize,
}

impl<'a, 'arena> Iterator for Predecessors<'a, 'arena> {
    type Item = BlockRef;

    fn next(&mut self) -> Option<BlockRef> {
        while self.index < self.uses.len() {
            let use_ref = self.uses[self.index];
            self.index += 1;
            let owner = self.ctx.use_owner(use_ref);
            if !self.ctx.is_terminator(owner) {
                continue;
            }
            if let Some(parent) = self.ctx.inst_parent(owner) {
                return Some(parent);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::core::session::CompilationSession;
    use crate::ir::graph::{DataType, InsertPos, IrContext};
    use bumpalo::Bump;

    #[test]
    fn test_jump_successor() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let entry = ctx.create_block(f);
        let next = ctx.create_block(f);
        let jump = ctx.new_jump(next);
        ctx.insert_instruction(entry, jump, InsertPos::Bottom);

        let succs: Vec<_> = ctx.successors(entry).collect();
        assert_eq!(succs, vec![next]);
        let preds: Vec<_> = ctx.predecessors(next).collect();
        assert_eq!(preds, vec![entry]);
    }

    #[test]
    fn test_cond_jump_successors() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let entry = ctx.create_block(f);
        let then_block = ctx.create_block(f);
        let else_block = ctx.create_block(f);
        let cond = ctx.const_int(1);
        let br = ctx.new_cond_jump(then_block, else_block, cond);
        ctx.insert_instruction(entry, br, InsertPos::Bottom);

        let succs: Vec<_> = ctx.successors(entry).collect();
        assert_eq!(succs, vec![then_block, else_block]);
    }

    #[test]
    fn test_return_has_no_successors() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let entry = ctx.create_block(f);
        let ret = ctx.new_return(None);
        ctx.insert_instruction(entry, ret, InsertPos::Bottom);

        assert_eq!(ctx.successors(entry).count(), 0);
    }

    #[test]
    fn test_phi_as_terminator_tolerated() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let entry = ctx.create_block(f);
        let other = ctx.create_block(f);
        let v = ctx.const_int(1);
        let phi = ctx.new_phi(DataType::Int64);
        ctx.phi_insert_incoming(phi, other, v);
        ctx.insert_instruction(entry, phi, InsertPos::Bottom);

        // Malformed block, but the iterator stays well defined. The phi's
        // block operand must not leak out as a successor either.
        assert_eq!(ctx.successors(entry).count(), 0);
        // A phi use of a block value is not a predecessor edge.
        assert_eq!(ctx.predecessors(other).count(), 0);
    }

    #[test]
    fn test_two_predecessors() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let a = ctx.create_block(f);
        let b = ctx.create_block(f);
        let join = ctx.create_block(f);
        let j1 = ctx.new_jump(join);
        let j2 = ctx.new_jump(join);
        ctx.insert_instruction(a, j1, InsertPos::Bottom);
        ctx.insert_instruction(b, j2, InsertPos::Bottom);

        let mut preds: Vec<_> = ctx.predecessors(join).collect();
        preds.sort();
        assert_eq!(preds, vec![a, b]);
    }
}
