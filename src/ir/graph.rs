// This module implements the mutable IR graph: values, uses, instructions, basic blocks
// and functions, stored as index-addressed tables inside IrContext. Everything that
// produces a result is a Value, including basic blocks themselves, which is how jump
// targets and predecessor edges work without any separate adjacency storage. Each value
// carries a use-list of Use edges pointing at it; set_use and replace_all_uses are the
// only operations that touch use-lists, which keeps the def-use graph consistent by
// construction. Instructions own fixed-size operand slot arrays, except phi and call
// which grow their slot arrays. The graph is cyclic (instruction -> block -> instruction
// list), so all back-edges are plain index handles rather than references.

//! IR graph data structures and mutation operations.
//!
//! The IR is stored in flat tables owned by [`IrContext`]; `ValueRef`,
//! `InstRef`, `BlockRef` and `FuncRef` are typed indices into those tables.
//! A `Use` is an identity-stable edge: the same `UseRef` stays in an
//! instruction's operand slot even when the referenced value changes.

use crate::core::session::CompilationSession;

/// Data type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Void,
    Int64,
    Ptr,
    Block,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::Void => "void",
            DataType::Int64 => "int64",
            DataType::Ptr => "ptr",
            DataType::Block => "block",
        }
    }
}

/// Binary operation kinds, comparisons included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Equals,
    Less,
    Greater,
    LessEq,
    GreaterEq,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Equals => "equals",
            BinaryOp::Less => "less",
            BinaryOp::Greater => "greater",
            BinaryOp::LessEq => "less_eq",
            BinaryOp::GreaterEq => "greater_eq",
        }
    }

    /// Whether this operation produces a boolean-like 0/1 result.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equals
                | BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEq
                | BinaryOp::GreaterEq
        )
    }
}

macro_rules! define_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub(crate) fn new(index: usize) -> Self {
                Self(index as u32)
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_handle!(
    /// Handle to a value in the graph.
    ValueRef
);
define_handle!(
    /// Handle to an instruction.
    InstRef
);
define_handle!(
    /// Handle to a basic block.
    BlockRef
);
define_handle!(
    /// Handle to a function.
    FuncRef
);
define_handle!(
    /// Handle to a use edge.
    UseRef
);

/// Pre-SSA variable id, assigned by the IR builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// What a value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Result of an instruction.
    Inst(InstRef),
    /// Integer constant, materialized inline when printed.
    Constant(i64),
    /// A basic block; jump instructions use these as operands.
    Block(BlockRef),
    /// Function argument with its position.
    Arg(FuncRef, u32),
    /// A function's own identity value.
    Function(FuncRef),
}

pub(crate) struct ValueData<'arena> {
    pub ty: DataType,
    pub kind: ValueKind,
    pub name: Option<&'arena str>,
    /// Uses currently pointing at this value.
    pub uses: Vec<UseRef>,
}

/// A use edge between one instruction operand slot and the value it reads.
pub(crate) struct UseData {
    pub owner: InstRef,
    #[allow(dead_code)]
    pub slot: u32,
    pub value: ValueRef,
}

/// Instruction kind tag. Operand layout is per kind: `LoadVar` has no
/// operands, `AssignVar` one, `Binary` two, `Jump` one (the target block),
/// `CondJump` three (then-block, else-block, condition), `Return` zero or
/// one, `Phi` and `Call` grow their slot arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstKind {
    /// Pre-SSA read of a variable. Only valid before SSA conversion.
    LoadVar(VarId),
    /// Pre-SSA write of a variable. Only valid before SSA conversion.
    AssignVar(VarId),
    Binary(BinaryOp),
    Jump,
    CondJump,
    Return,
    Call(FuncRef),
    Phi,
}

pub(crate) struct InstData {
    pub kind: InstKind,
    pub parent: Option<BlockRef>,
    /// Embedded result value, present for kinds that produce one.
    pub result: Option<ValueRef>,
    /// Operand slots. `None` until `set_use` first populates a slot.
    pub operands: Vec<Option<UseRef>>,
}

pub(crate) struct BlockData {
    pub value: ValueRef,
    pub parent: FuncRef,
    pub insts: Vec<InstRef>,
}

pub(crate) struct FunctionData<'arena> {
    pub value: ValueRef,
    pub name: &'arena str,
    pub return_type: DataType,
    pub entry: Option<BlockRef>,
    pub args: Vec<ValueRef>,
    /// Counter used to assign display names to anonymous values.
    pub name_counter: u32,
}

/// Where to link an instruction into a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPos {
    Top,
    Bottom,
}

/// The IR graph for one compilation unit.
pub struct IrContext<'arena> {
    pub(crate) funcs: Vec<FunctionData<'arena>>,
    pub(crate) blocks: Vec<BlockData>,
    pub(crate) insts: Vec<InstData>,
    pub(crate) values: Vec<ValueData<'arena>>,
    pub(crate) uses: Vec<UseData>,
    /// Names of pre-SSA variables, indexed by `VarId`.
    var_names: Vec<&'arena str>,
}

impl<'arena> Default for IrContext<'arena> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'arena> IrContext<'arena> {
    pub fn new() -> Self {
        Self {
            funcs: Vec::new(),
            blocks: Vec::new(),
            insts: Vec::new(),
            values: Vec::new(),
            uses: Vec::new(),
            var_names: Vec::new(),
        }
    }

    fn new_value(&mut self, ty: DataType, kind: ValueKind) -> ValueRef {
        let v = ValueRef::new(self.values.len());
        self.values.push(ValueData {
            ty,
            kind,
            name: None,
            uses: Vec::new(),
        });
        v
    }

    // ---- Functions and variables ----

    pub fn new_function(
        &mut self,
        session: &CompilationSession<'arena>,
        name: &str,
        return_type: DataType,
    ) -> FuncRef {
        let f = FuncRef::new(self.funcs.len());
        let value = self.new_value(DataType::Ptr, ValueKind::Function(f));
        self.funcs.push(FunctionData {
            value,
            name: session.intern_str(name),
            return_type,
            entry: None,
            args: Vec::new(),
            name_counter: 0,
        });
        f
    }

    pub fn function_name(&self, func: FuncRef) -> &'arena str {
        self.funcs[func.index()].name
    }

    pub fn function_return_type(&self, func: FuncRef) -> DataType {
        self.funcs[func.index()].return_type
    }

    pub fn function_value(&self, func: FuncRef) -> ValueRef {
        self.funcs[func.index()].value
    }

    pub fn entry_block(&self, func: FuncRef) -> Option<BlockRef> {
        self.funcs[func.index()].entry
    }

    pub fn set_entry_block(&mut self, func: FuncRef, block: BlockRef) {
        self.funcs[func.index()].entry = Some(block);
    }

    pub fn functions(&self) -> impl Iterator<Item = FuncRef> {
        (0..self.funcs.len()).map(FuncRef::new)
    }

    /// Add an argument value to a function.
    pub fn add_function_arg(&mut self, func: FuncRef, ty: DataType) -> ValueRef {
        let position = self.funcs[func.index()].args.len() as u32;
        let value = self.new_value(ty, ValueKind::Arg(func, position));
        self.funcs[func.index()].args.push(value);
        value
    }

    pub fn function_args(&self, func: FuncRef) -> &[ValueRef] {
        &self.funcs[func.index()].args
    }

    /// Register a pre-SSA variable and return its id.
    pub fn new_var(&mut self, session: &CompilationSession<'arena>, name: &str) -> VarId {
        let id = VarId(self.var_names.len() as u32);
        self.var_names.push(session.intern_str(name));
        id
    }

    pub fn var_name(&self, var: VarId) -> &'arena str {
        self.var_names[var.0 as usize]
    }

    // ---- Blocks ----

    /// Create an empty block owned by `func`. The first block created for a
    /// function becomes its entry block.
    pub fn create_block(&mut self, func: FuncRef) -> BlockRef {
        let b = BlockRef::new(self.blocks.len());
        let value = self.new_value(DataType::Block, ValueKind::Block(b));
        self.blocks.push(BlockData {
            value,
            parent: func,
            insts: Vec::new(),
        });
        if self.funcs[func.index()].entry.is_none() {
            self.funcs[func.index()].entry = Some(b);
        }
        b
    }

    pub fn block_value(&self, block: BlockRef) -> ValueRef {
        self.blocks[block.index()].value
    }

    /// The block a block-typed value refers to.
    pub fn value_as_block(&self, value: ValueRef) -> Option<BlockRef> {
        match self.values[value.index()].kind {
            ValueKind::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn block_insts(&self, block: BlockRef) -> &[InstRef] {
        &self.blocks[block.index()].insts
    }

    /// Last instruction of the block, if any.
    pub fn last_instruction(&self, block: BlockRef) -> Option<InstRef> {
        self.blocks[block.index()].insts.last().copied()
    }

    // ---- Instruction creation ----

    fn new_inst(
        &mut self,
        kind: InstKind,
        result_type: Option<DataType>,
        operand_count: usize,
    ) -> InstRef {
        let inst = InstRef::new(self.insts.len());
        let result = result_type.map(|ty| self.new_value(ty, ValueKind::Inst(inst)));
        self.insts.push(InstData {
            kind,
            parent: None,
            result,
            operands: vec![None; operand_count],
        });
        inst
    }

    pub fn const_int(&mut self, number: i64) -> ValueRef {
        self.new_value(DataType::Int64, ValueKind::Constant(number))
    }

    pub fn new_load_var(&mut self, var: VarId) -> InstRef {
        self.new_inst(InstKind::LoadVar(var), Some(DataType::Int64), 0)
    }

    pub fn new_assign_var(&mut self, var: VarId, value: ValueRef) -> InstRef {
        let inst = self.new_inst(InstKind::AssignVar(var), None, 1);
        self.set_use(inst, 0, value);
        inst
    }

    pub fn new_binary(&mut self, op: BinaryOp, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        assert_eq!(
            self.value_type(lhs),
            self.value_type(rhs),
            "data type mismatch"
        );
        let ty = self.value_type(lhs);
        let inst = self.new_inst(InstKind::Binary(op), Some(ty), 2);
        self.set_use(inst, 0, lhs);
        self.set_use(inst, 1, rhs);
        inst
    }

    pub fn new_jump(&mut self, target: BlockRef) -> InstRef {
        let inst = self.new_inst(InstKind::Jump, None, 1);
        let target_value = self.block_value(target);
        self.set_use(inst, 0, target_value);
        inst
    }

    pub fn new_cond_jump(
        &mut self,
        then_block: BlockRef,
        else_block: BlockRef,
        cond: ValueRef,
    ) -> InstRef {
        let inst = self.new_inst(InstKind::CondJump, None, 3);
        let then_value = self.block_value(then_block);
        let else_value = self.block_value(else_block);
        self.set_use(inst, 0, then_value);
        self.set_use(inst, 1, else_value);
        self.set_use(inst, 2, cond);
        inst
    }

    pub fn new_return(&mut self, value: Option<ValueRef>) -> InstRef {
        match value {
            Some(v) => {
                let inst = self.new_inst(InstKind::Return, None, 1);
                self.set_use(inst, 0, v);
                inst
            }
            None => self.new_inst(InstKind::Return, None, 0),
        }
    }

    pub fn new_call(&mut self, callee: FuncRef, args: &[ValueRef]) -> InstRef {
        let return_type = self.function_return_type(callee);
        let result_type = match return_type {
            DataType::Void => None,
            ty => Some(ty),
        };
        let inst = self.new_inst(InstKind::Call(callee), result_type, args.len());
        for (slot, &arg) in args.iter().enumerate() {
            self.set_use(inst, slot, arg);
        }
        inst
    }

    /// Create an empty phi. Incoming pairs are added with
    /// [`IrContext::phi_insert_incoming`].
    pub fn new_phi(&mut self, ty: DataType) -> InstRef {
        self.new_inst(InstKind::Phi, Some(ty), 0)
    }

    /// Append an incoming `(block, value)` pair to a phi. Inserting a pair
    /// that is already present is a no-op.
    pub fn phi_insert_incoming(&mut self, phi: InstRef, block: BlockRef, value: ValueRef) {
        assert_eq!(self.insts[phi.index()].kind, InstKind::Phi, "not a phi");
        let block_value = self.block_value(block);

        let count = self.insts[phi.index()].operands.len();
        debug_assert!(count % 2 == 0);
        for pair in 0..count / 2 {
            let b = self.operand(phi, pair * 2);
            let v = self.operand(phi, pair * 2 + 1);
            if b == Some(block_value) && v == Some(value) {
                return;
            }
        }

        self.insts[phi.index()].operands.push(None);
        self.insts[phi.index()].operands.push(None);
        self.set_use(phi, count, block_value);
        self.set_use(phi, count + 1, value);
    }

    /// Incoming `(block, value)` pairs of a phi.
    pub fn phi_incomings(&self, phi: InstRef) -> Vec<(BlockRef, ValueRef)> {
        assert_eq!(self.insts[phi.index()].kind, InstKind::Phi, "not a phi");
        let count = self.insts[phi.index()].operands.len();
        let mut pairs = Vec::with_capacity(count / 2);
        for pair in 0..count / 2 {
            let block_value = self.operand(phi, pair * 2).expect("phi block slot unset");
            let value = self.operand(phi, pair * 2 + 1).expect("phi value slot unset");
            let block = self
                .value_as_block(block_value)
                .expect("phi block slot holds a non-block value");
            pairs.push((block, value));
        }
        pairs
    }

    // ---- Instruction linking and operands ----

    /// Link an instruction into a block. An instruction must not be linked
    /// into more than one block.
    pub fn insert_instruction(&mut self, block: BlockRef, inst: InstRef, pos: InsertPos) {
        assert!(
            self.insts[inst.index()].parent.is_none(),
            "instruction already linked into a block"
        );
        self.insts[inst.index()].parent = Some(block);
        match pos {
            InsertPos::Top => self.blocks[block.index()].insts.insert(0, inst),
            InsertPos::Bottom => self.blocks[block.index()].insts.push(inst),
        }
    }

    /// Detach an instruction from its block. Operand use edges are kept; a
    /// caller that wants full removal must also call
    /// [`IrContext::clear_operand_uses`].
    pub fn remove_instruction(&mut self, inst: InstRef) {
        let parent = self.insts[inst.index()]
            .parent
            .expect("instruction not linked into any block");
        let insts = &mut self.blocks[parent.index()].insts;
        let position = insts
            .iter()
            .position(|&i| i == inst)
            .expect("instruction missing from its parent block");
        insts.remove(position);
        self.insts[inst.index()].parent = None;
    }

    /// Establish or retarget operand `slot` of `inst` to reference `value`.
    ///
    /// If the slot already holds a use, that use is detached from its old
    /// value's use-list and re-attached to `value`; the `UseRef` itself is
    /// stable.
    pub fn set_use(&mut self, inst: InstRef, slot: usize, value: ValueRef) {
        let count = self.insts[inst.index()].operands.len();
        assert!(slot < count, "operand slot {} out of range ({})", slot, count);

        let use_ref = match self.insts[inst.index()].operands[slot] {
            Some(u) => {
                let old_value = self.uses[u.index()].value;
                let list = &mut self.values[old_value.index()].uses;
                let position = list
                    .iter()
                    .position(|&x| x == u)
                    .expect("use missing from its value's use-list");
                list.remove(position);
                u
            }
            None => {
                let u = UseRef::new(self.uses.len());
                self.uses.push(UseData {
                    owner: inst,
                    slot: slot as u32,
                    value,
                });
                self.insts[inst.index()].operands[slot] = Some(u);
                u
            }
        };

        self.uses[use_ref.index()].value = value;
        self.values[value.index()].uses.push(use_ref);
    }

    /// Detach every operand use of `inst` from the referenced values'
    /// use-lists. Used together with [`IrContext::remove_instruction`] for
    /// full removal.
    pub fn clear_operand_uses(&mut self, inst: InstRef) {
        for slot in 0..self.insts[inst.index()].operands.len() {
            if let Some(u) = self.insts[inst.index()].operands[slot] {
                let value = self.uses[u.index()].value;
                let list = &mut self.values[value.index()].uses;
                if let Some(position) = list.iter().position(|&x| x == u) {
                    list.remove(position);
                }
                self.insts[inst.index()].operands[slot] = None;
            }
        }
    }

    /// Rewire every use of `old` to point at `new` in one pass. Afterwards
    /// `old`'s use-list is empty and `new` holds the union.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        assert_ne!(old, new, "replacing a value with itself");
        let moved = std::mem::take(&mut self.values[old.index()].uses);
        for &u in &moved {
            self.uses[u.index()].value = new;
        }
        self.values[new.index()].uses.extend(moved);
    }

    pub fn operand_count(&self, inst: InstRef) -> usize {
        self.insts[inst.index()].operands.len()
    }

    /// Value currently referenced by operand `slot`, `None` if unset.
    pub fn operand(&self, inst: InstRef, slot: usize) -> Option<ValueRef> {
        self.insts[inst.index()].operands[slot].map(|u| self.uses[u.index()].value)
    }

    /// All operand values in slot order. Unset slots are skipped.
    pub fn operands(&self, inst: InstRef) -> impl Iterator<Item = ValueRef> + '_ {
        self.insts[inst.index()]
            .operands
            .iter()
            .filter_map(|slot| slot.map(|u| self.uses[u.index()].value))
    }

    pub fn inst_kind(&self, inst: InstRef) -> InstKind {
        self.insts[inst.index()].kind
    }

    pub fn inst_parent(&self, inst: InstRef) -> Option<BlockRef> {
        self.insts[inst.index()].parent
    }

    pub fn inst_result(&self, inst: InstRef) -> Option<ValueRef> {
        self.insts[inst.index()].result
    }

    pub fn is_terminator(&self, inst: InstRef) -> bool {
        matches!(
            self.insts[inst.index()].kind,
            InstKind::Jump | InstKind::CondJump | InstKind::Return
        )
    }

    // ---- Values ----

    pub fn value_type(&self, value: ValueRef) -> DataType {
        self.values[value.index()].ty
    }

    pub fn value_kind(&self, value: ValueRef) -> ValueKind {
        self.values[value.index()].kind
    }

    /// Uses currently pointing at `value`.
    pub fn value_uses(&self, value: ValueRef) -> &[UseRef] {
        &self.values[value.index()].uses
    }

    pub fn use_owner(&self, use_ref: UseRef) -> InstRef {
        self.uses[use_ref.index()].owner
    }

    pub fn use_value(&self, use_ref: UseRef) -> ValueRef {
        self.uses[use_ref.index()].value
    }

    /// The function a value belongs to, if it can be derived.
    pub fn value_function(&self, value: ValueRef) -> Option<FuncRef> {
        match self.values[value.index()].kind {
            ValueKind::Block(b) => Some(self.blocks[b.index()].parent),
            ValueKind::Inst(i) => {
                let parent = self.insts[i.index()].parent?;
                Some(self.blocks[parent.index()].parent)
            }
            ValueKind::Arg(f, _) => Some(f),
            ValueKind::Function(f) => Some(f),
            ValueKind::Constant(_) => None,
        }
    }

    /// Get the display name of a value, lazily assigning `"<counter>"` from
    /// the owning function's counter on first request.
    pub fn get_or_assign_name(
        &mut self,
        session: &CompilationSession<'arena>,
        value: ValueRef,
    ) -> &'arena str {
        if let Some(name) = self.values[value.index()].name {
            return name;
        }
        let func = self
            .value_function(value)
            .expect("cannot name a value with no owning function");
        let number = self.funcs[func.index()].name_counter;
        self.funcs[func.index()].name_counter += 1;
        let name = session.intern_str(&number.to_string());
        self.values[value.index()].name = Some(name);
        name
    }

    pub fn set_value_name(&mut self, session: &CompilationSession<'arena>, value: ValueRef, name: &str) {
        self.values[value.index()].name = Some(session.intern_str(name));
    }

    /// Check the def-use invariant: an instruction has operand `v` in slot
    /// `s` iff the use for `(i, s)` appears in `v`'s use-list. Panics on the
    /// first violation.
    pub fn verify_use_lists(&self) {
        for (i, inst) in self.insts.iter().enumerate() {
            for (slot, entry) in inst.operands.iter().enumerate() {
                if let Some(u) = entry {
                    let value = self.uses[u.index()].value;
                    assert!(
                        self.values[value.index()].uses.contains(u),
                        "use ({}, {}) missing from use-list of its value",
                        i,
                        slot
                    );
                }
            }
        }
        for (v, value) in self.values.iter().enumerate() {
            for &u in &value.uses {
                assert_eq!(
                    self.uses[u.index()].value.index(),
                    v,
                    "use-list of value {} contains a use pointing elsewhere",
                    v
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    #[test]
    fn test_set_use_retargets() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let _entry = ctx.create_block(f);
        let a = ctx.const_int(1);
        let b = ctx.const_int(2);
        let c = ctx.const_int(3);

        let add = ctx.new_binary(BinaryOp::Add, a, b);
        assert_eq!(ctx.operand(add, 0), Some(a));
        assert_eq!(ctx.value_uses(a).len(), 1);

        ctx.set_use(add, 0, c);
        assert_eq!(ctx.operand(add, 0), Some(c));
        assert!(ctx.value_uses(a).is_empty());
        assert_eq!(ctx.value_uses(c).len(), 1);
        ctx.verify_use_lists();
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_set_use_slot_out_of_range() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let _entry = ctx.create_block(f);
        let a = ctx.const_int(1);
        let b = ctx.const_int(2);
        let add = ctx.new_binary(BinaryOp::Add, a, b);
        ctx.set_use(add, 2, a);
    }

    #[test]
    fn test_replace_all_uses() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let _entry = ctx.create_block(f);
        let old = ctx.const_int(1);
        let new = ctx.const_int(2);
        let other = ctx.const_int(3);

        let i1 = ctx.new_binary(BinaryOp::Add, old, other);
        let i2 = ctx.new_binary(BinaryOp::Sub, other, old);

        ctx.replace_all_uses(old, new);
        assert!(ctx.value_uses(old).is_empty());
        assert_eq!(ctx.value_uses(new).len(), 2);
        assert_eq!(ctx.operand(i1, 0), Some(new));
        assert_eq!(ctx.operand(i2, 1), Some(new));
        ctx.verify_use_lists();
    }

    #[test]
    fn test_remove_instruction_keeps_operand_uses() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let entry = ctx.create_block(f);
        let v = ctx.const_int(7);
        let var = ctx.new_var(&session, "x");
        let assign = ctx.new_assign_var(var, v);
        ctx.insert_instruction(entry, assign, InsertPos::Bottom);

        ctx.remove_instruction(assign);
        assert!(ctx.inst_parent(assign).is_none());
        assert!(ctx.block_insts(entry).is_empty());
        // The operand edge survives removal.
        assert_eq!(ctx.value_uses(v).len(), 1);

        ctx.clear_operand_uses(assign);
        assert!(ctx.value_uses(v).is_empty());
    }

    #[test]
    fn test_phi_incoming_dedup() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let entry = ctx.create_block(f);
        let other = ctx.create_block(f);
        let v1 = ctx.const_int(1);
        let v2 = ctx.const_int(2);

        let phi = ctx.new_phi(DataType::Int64);
        ctx.phi_insert_incoming(phi, entry, v1);
        ctx.phi_insert_incoming(phi, other, v2);
        ctx.phi_insert_incoming(phi, entry, v1); // duplicate, ignored

        let incomings = ctx.phi_incomings(phi);
        assert_eq!(incomings, vec![(entry, v1), (other, v2)]);
        ctx.verify_use_lists();
    }

    #[test]
    fn test_lazy_value_names() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();

        let f = ctx.new_function(&session, "f", DataType::Void);
        let entry = ctx.create_block(f);
        let b2 = ctx.create_block(f);

        let n1 = ctx.get_or_assign_name(&session, ctx.block_value(entry));
        let n2 = ctx.get_or_assign_name(&session, ctx.block_value(b2));
        let n1_again = ctx.get_or_assign_name(&session, ctx.block_value(entry));
        assert_eq!(n1, "0");
        assert_eq!(n2, "1");
        assert_eq!(n1, n1_again);
    }
}
