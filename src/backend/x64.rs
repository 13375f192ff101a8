// This module walks SSA IR and emits x86-64 machine code through the iced-x86
// CodeAssembler, driving the LRU register allocator as it goes. The lowering is
// deliberately simple and register-state conservative:
//
//   - every block ends by spilling all register-resident variables, so every block
//     begins with an empty register file and values travel between blocks through
//     their stack slots;
//   - phi nodes are resolved through per-phi staging slots: each incoming edge stores
//     its value into the phi's staging slot before branching, and the phi's own block
//     copies staging to the phi's home slot on entry. The extra copy makes parallel
//     phi semantics (swaps between phis of one block) correct without cycle analysis;
//   - division spills everything and uses rax/rdx directly, since idiv demands them;
//   - calls follow the System V argument registers rdi, rsi, rdx, rcx, r8, r9, spill
//     everything beforehand, and receive results in rax.
//
// The whole module is assembled in one CodeAssembler so calls between functions are
// plain label branches; function offsets are recovered from the assembler afterwards.

//! x86-64 code emission over SSA IR.

use hashbrown::HashMap;
use iced_x86::code_asm::*;
use iced_x86::BlockEncoderOptions;

use super::regalloc::{RegAlloc, RegId, SpillSink, Variable};
use crate::analysis::dominators::Dominators;
use crate::core::error::{CompileError, CompileResult};
use crate::core::session::CompilationSession;
use crate::ir::graph::{
    BinaryOp, BlockRef, FuncRef, InstKind, InstRef, IrContext, ValueKind, ValueRef,
};

/// Allocatable general-purpose registers, in allocation order. rsp and rbp
/// are reserved for the frame, r12-r15 left alone to keep the callee-saved
/// set empty.
const NUM_ALLOCATABLE: usize = 9;

/// Register ids of the System V argument registers within the allocatable
/// set: rdi, rsi, rdx, rcx, r8, r9.
const ARG_REG_IDS: [RegId; 6] = [4, 3, 2, 1, 5, 6];

/// Register id of rax, used for call results and return values.
const RAX_ID: RegId = 0;

fn gp64(reg: RegId) -> AsmRegister64 {
    const GP64_REGS: [AsmRegister64; NUM_ALLOCATABLE] =
        [rax, rcx, rdx, rsi, rdi, r8, r9, r10, r11];
    GP64_REGS[reg as usize]
}

fn gp8(reg: RegId) -> AsmRegister8 {
    const GP8_REGS: [AsmRegister8; NUM_ALLOCATABLE] =
        [al, cl, dl, sil, dil, r8b, r9b, r10b, r11b];
    GP8_REGS[reg as usize]
}

/// rbp-relative displacement of a stack slot.
fn slot_offset(slot: u32) -> i32 {
    -8 * (slot as i32 + 1)
}

fn encode_err(err: iced_x86::IcedError) -> CompileError {
    CompileError::Encoding(err.to_string())
}

/// Spill sink writing through the function frame.
struct AsmSink<'x, 's, 'arena> {
    asm: &'x mut CodeAssembler,
    session: &'s CompilationSession<'arena>,
}

impl SpillSink for AsmSink<'_, '_, '_> {
    fn emit_store(&mut self, reg: RegId, slot: u32) -> CompileResult<()> {
        self.asm
            .mov(qword_ptr(rbp + slot_offset(slot)), gp64(reg))
            .map_err(encode_err)?;
        self.session.record_spill_generated();
        Ok(())
    }

    fn emit_reload(&mut self, reg: RegId, slot: u32) -> CompileResult<()> {
        self.asm
            .mov(gp64(reg), qword_ptr(rbp + slot_offset(slot)))
            .map_err(encode_err)
    }
}

/// One compiled function inside the module's text.
pub struct CompiledFunction {
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

/// Raw machine code for a whole module plus per-function layout.
pub struct CompiledModule {
    pub code: Vec<u8>,
    pub functions: Vec<CompiledFunction>,
}

/// Compile every function in the context to machine code.
pub fn compile_module<'arena>(
    ctx: &IrContext<'arena>,
    session: &CompilationSession<'arena>,
) -> CompileResult<CompiledModule> {
    let mut asm = CodeAssembler::new(64).map_err(encode_err)?;

    let mut func_labels: HashMap<FuncRef, CodeLabel> = HashMap::new();
    for func in ctx.functions() {
        func_labels.insert(func, asm.create_label());
    }

    for func in ctx.functions() {
        let doms = Dominators::compute(ctx, func);
        let mut emitter = FunctionEmitter::new(ctx, session);
        emitter.emit(&mut asm, &mut func_labels, func, &doms)?;
    }

    let result = asm
        .assemble_options(0, BlockEncoderOptions::RETURN_NEW_INSTRUCTION_OFFSETS)
        .map_err(encode_err)?;

    let mut offsets: Vec<(FuncRef, u64)> = Vec::new();
    for func in ctx.functions() {
        let offset = result.label_ip(&func_labels[&func]).map_err(encode_err)?;
        offsets.push((func, offset));
    }
    let code = result.inner.code_buffer;

    // Function size is the distance to the next function in layout order.
    let mut sorted = offsets.clone();
    sorted.sort_by_key(|&(_, offset)| offset);
    let mut functions = Vec::new();
    for (index, &(func, offset)) in sorted.iter().enumerate() {
        let end = sorted
            .get(index + 1)
            .map_or(code.len() as u64, |&(_, next)| next);
        let name = ctx.function_name(func).to_string();
        session.record_function_compiled(&name, (end - offset) as usize);
        functions.push(CompiledFunction {
            name,
            offset,
            size: end - offset,
        });
    }

    Ok(CompiledModule { code, functions })
}

struct FunctionEmitter<'a, 'arena> {
    ctx: &'a IrContext<'arena>,
    session: &'a CompilationSession<'arena>,
    alloc: RegAlloc,
    /// SSA value to allocator variable.
    value_vars: HashMap<ValueRef, Variable>,
    /// Phi result to its staging slot; see the module comment.
    phi_staging: HashMap<ValueRef, u32>,
    block_labels: HashMap<BlockRef, CodeLabel>,
}

impl<'a, 'arena> FunctionEmitter<'a, 'arena> {
    fn new(ctx: &'a IrContext<'arena>, session: &'a CompilationSession<'arena>) -> Self {
        Self {
            ctx,
            session,
            alloc: RegAlloc::new(NUM_ALLOCATABLE),
            value_vars: HashMap::new(),
            phi_staging: HashMap::new(),
            block_labels: HashMap::new(),
        }
    }

    fn emit(
        &mut self,
        asm: &mut CodeAssembler,
        func_labels: &mut HashMap<FuncRef, CodeLabel>,
        func: FuncRef,
        doms: &Dominators,
    ) -> CompileResult<()> {
        if doms.entry().is_none() {
            return Err(CompileError::Unsupported(format!(
                "function `{}` has no blocks",
                self.ctx.function_name(func)
            )));
        }

        // Reverse postorder, entry first.
        let order: Vec<BlockRef> = (0..doms.block_count())
            .rev()
            .map(|number| doms.block(number))
            .collect();
        for &block in &order {
            self.block_labels.insert(block, asm.create_label());
        }

        let func_label = func_labels
            .get_mut(&func)
            .expect("function label was pre-created");
        asm.set_label(func_label).map_err(encode_err)?;

        // Prologue. The frame is sized up front from a slot-count upper
        // bound: one slot per argument, one per instruction result, plus a
        // staging slot per phi.
        asm.push(rbp).map_err(encode_err)?;
        asm.mov(rbp, rsp).map_err(encode_err)?;
        let mut estimated_slots = self.ctx.function_args(func).len();
        for &block in &order {
            for &inst in self.ctx.block_insts(block) {
                if self.ctx.inst_result(inst).is_some() {
                    estimated_slots += 1;
                    if self.ctx.inst_kind(inst) == InstKind::Phi {
                        estimated_slots += 1;
                    }
                }
            }
        }
        let frame_size = ((estimated_slots * 8 + 15) & !15) as i32;
        if frame_size > 0 {
            asm.sub(rsp, frame_size).map_err(encode_err)?;
        }

        // Incoming arguments arrive in the System V registers.
        for (position, &arg) in self.ctx.function_args(func).iter().enumerate() {
            let Some(&reg) = ARG_REG_IDS.get(position) else {
                return Err(CompileError::Unsupported(format!(
                    "`{}` takes more than {} arguments",
                    self.ctx.function_name(func),
                    ARG_REG_IDS.len()
                )));
            };
            let var = self.alloc.new_variable();
            self.alloc.bind_to_register(var, reg);
            self.value_vars.insert(arg, var);
        }

        // Give every phi a home slot and a staging slot before any code is
        // emitted; incoming edges write staging slots of blocks emitted
        // later.
        for &block in &order {
            for &inst in self.ctx.block_insts(block) {
                if self.ctx.inst_kind(inst) != InstKind::Phi {
                    continue;
                }
                let result = self.ctx.inst_result(inst).expect("phi has a result");
                let var = self.alloc.new_variable();
                self.alloc.ensure_slot(var);
                self.value_vars.insert(result, var);
                let staging_var = self.alloc.new_variable();
                let staging = self.alloc.ensure_slot(staging_var);
                self.phi_staging.insert(result, staging);
            }
        }

        for &block in &order {
            self.emit_block(asm, func_labels, block)?;
        }
        debug_assert!(
            self.alloc.frame_slots() as usize <= estimated_slots,
            "frame estimate too small"
        );
        Ok(())
    }

    fn emit_block(
        &mut self,
        asm: &mut CodeAssembler,
        func_labels: &HashMap<FuncRef, CodeLabel>,
        block: BlockRef,
    ) -> CompileResult<()> {
        let mut label = self.block_labels[&block];
        asm.set_label(&mut label).map_err(encode_err)?;

        let insts: Vec<InstRef> = self.ctx.block_insts(block).to_vec();

        // Land phi values: staging slot to home slot. rax is free here,
        // every predecessor spilled all registers before branching.
        for &inst in &insts {
            if self.ctx.inst_kind(inst) != InstKind::Phi {
                continue;
            }
            let result = self.ctx.inst_result(inst).expect("phi has a result");
            let staging = self.phi_staging[&result];
            let home = self
                .alloc
                .slot_of(self.value_vars[&result])
                .expect("phi variable has a pre-assigned slot");
            asm.mov(rax, qword_ptr(rbp + slot_offset(staging)))
                .map_err(encode_err)?;
            asm.mov(qword_ptr(rbp + slot_offset(home)), rax)
                .map_err(encode_err)?;
        }

        let mut has_terminator = false;
        for &inst in &insts {
            self.session.record_instruction_compiled();
            match self.ctx.inst_kind(inst) {
                InstKind::Phi => {}
                InstKind::Binary(op) => self.emit_binary(asm, inst, op)?,
                InstKind::Call(callee) => self.emit_call(asm, func_labels, inst, callee)?,
                InstKind::Jump => {
                    self.emit_spill_all(asm)?;
                    self.emit_edge_moves(asm, block)?;
                    let target = self
                        .ctx
                        .operand(inst, 0)
                        .and_then(|v| self.ctx.value_as_block(v))
                        .expect("jump target unset");
                    asm.jmp(self.block_labels[&target]).map_err(encode_err)?;
                    has_terminator = true;
                }
                InstKind::CondJump => {
                    let cond = self.ctx.operand(inst, 2).expect("cond_jump cond unset");
                    let cond_reg = self.value_reg(asm, cond)?;
                    asm.test(gp64(cond_reg), gp64(cond_reg)).map_err(encode_err)?;
                    // Everything from here to the branches is mov traffic,
                    // which leaves the flags alone.
                    self.emit_spill_all(asm)?;
                    self.emit_edge_moves(asm, block)?;
                    let then_block = self
                        .ctx
                        .operand(inst, 0)
                        .and_then(|v| self.ctx.value_as_block(v))
                        .expect("cond_jump then-target unset");
                    let else_block = self
                        .ctx
                        .operand(inst, 1)
                        .and_then(|v| self.ctx.value_as_block(v))
                        .expect("cond_jump else-target unset");
                    asm.jne(self.block_labels[&then_block]).map_err(encode_err)?;
                    asm.jmp(self.block_labels[&else_block]).map_err(encode_err)?;
                    has_terminator = true;
                }
                InstKind::Return => {
                    if self.ctx.operand_count(inst) == 1 {
                        let value = self.ctx.operand(inst, 0).expect("return operand unset");
                        let reg = self.value_reg(asm, value)?;
                        if reg != RAX_ID {
                            asm.mov(rax, gp64(reg)).map_err(encode_err)?;
                        }
                    }
                    asm.mov(rsp, rbp).map_err(encode_err)?;
                    asm.pop(rbp).map_err(encode_err)?;
                    asm.ret().map_err(encode_err)?;
                    // Nothing is live past a return; reset the bookkeeping
                    // so the next block starts from the empty state.
                    self.alloc.forget_all();
                    has_terminator = true;
                }
                InstKind::LoadVar(_) | InstKind::AssignVar(_) => {
                    panic!("pre-SSA instruction reached the code emitter")
                }
            }
        }

        if !has_terminator {
            let block_name = format!("b{}", block.index());
            return Err(CompileError::MissingTerminator { block: block_name });
        }
        Ok(())
    }

    /// Materialize a value into a register: variables through the
    /// allocator, constants into a fresh temporary.
    fn value_reg(&mut self, asm: &mut CodeAssembler, value: ValueRef) -> CompileResult<RegId> {
        let session = self.session;
        match self.ctx.value_kind(value) {
            ValueKind::Constant(number) => {
                let tmp = self.alloc.new_temp();
                let reg = {
                    let mut sink = AsmSink { asm: &mut *asm, session };
                    self.alloc.get_or_allocate(&mut sink, tmp)?
                };
                asm.mov(gp64(reg), number).map_err(encode_err)?;
                Ok(reg)
            }
            _ => {
                let var = *self
                    .value_vars
                    .get(&value)
                    .expect("value used before it was defined");
                let mut sink = AsmSink { asm: &mut *asm, session };
                self.alloc.get_or_allocate(&mut sink, var)
            }
        }
    }

    /// Allocate a register for an instruction result.
    fn define_result(&mut self, asm: &mut CodeAssembler, inst: InstRef) -> CompileResult<RegId> {
        let result = self.ctx.inst_result(inst).expect("instruction has no result");
        let var = self.alloc.new_variable();
        self.value_vars.insert(result, var);
        let session = self.session;
        let mut sink = AsmSink { asm: &mut *asm, session };
        self.alloc.get_or_allocate(&mut sink, var)
    }

    fn emit_spill_all(&mut self, asm: &mut CodeAssembler) -> CompileResult<()> {
        let session = self.session;
        let mut sink = AsmSink { asm: &mut *asm, session };
        self.alloc.spill_all(&mut sink)
    }

    fn emit_binary(
        &mut self,
        asm: &mut CodeAssembler,
        inst: InstRef,
        op: BinaryOp,
    ) -> CompileResult<()> {
        let lhs = self.ctx.operand(inst, 0).expect("binary lhs unset");
        let rhs = self.ctx.operand(inst, 1).expect("binary rhs unset");

        if op == BinaryOp::Div {
            return self.emit_div(asm, inst, lhs, rhs);
        }

        // With at least three allocatable registers the LRU order protects
        // the two most recently touched registers, so allocating the result
        // cannot evict either operand.
        let lhs_reg = self.value_reg(asm, lhs)?;
        let rhs_reg = self.value_reg(asm, rhs)?;

        if op.is_comparison() {
            asm.cmp(gp64(lhs_reg), gp64(rhs_reg)).map_err(encode_err)?;
            // Result allocation emits only mov traffic; the flags survive.
            let dst = self.define_result(asm, inst)?;
            match op {
                BinaryOp::Equals => asm.sete(gp8(dst)).map_err(encode_err)?,
                BinaryOp::Less => asm.setl(gp8(dst)).map_err(encode_err)?,
                BinaryOp::Greater => asm.setg(gp8(dst)).map_err(encode_err)?,
                BinaryOp::LessEq => asm.setle(gp8(dst)).map_err(encode_err)?,
                BinaryOp::GreaterEq => asm.setge(gp8(dst)).map_err(encode_err)?,
                _ => unreachable!(),
            }
            asm.movzx(gp64(dst), gp8(dst)).map_err(encode_err)?;
        } else {
            let dst = self.define_result(asm, inst)?;
            asm.mov(gp64(dst), gp64(lhs_reg)).map_err(encode_err)?;
            match op {
                BinaryOp::Add => asm.add(gp64(dst), gp64(rhs_reg)).map_err(encode_err)?,
                BinaryOp::Sub => asm.sub(gp64(dst), gp64(rhs_reg)).map_err(encode_err)?,
                BinaryOp::Mul => asm.imul_2(gp64(dst), gp64(rhs_reg)).map_err(encode_err)?,
                _ => unreachable!(),
            }
        }
        Ok(())
    }

    /// idiv wants the dividend in rdx:rax, so division takes the
    /// conservative route: spill everything, work from the slots.
    fn emit_div(
        &mut self,
        asm: &mut CodeAssembler,
        inst: InstRef,
        lhs: ValueRef,
        rhs: ValueRef,
    ) -> CompileResult<()> {
        self.emit_spill_all(asm)?;

        match self.ctx.value_kind(lhs) {
            ValueKind::Constant(number) => asm.mov(rax, number).map_err(encode_err)?,
            _ => {
                let slot = self.spilled_slot(lhs);
                asm.mov(rax, qword_ptr(rbp + slot_offset(slot)))
                    .map_err(encode_err)?;
            }
        }
        asm.cqo().map_err(encode_err)?;
        match self.ctx.value_kind(rhs) {
            ValueKind::Constant(number) => {
                asm.mov(rcx, number).map_err(encode_err)?;
                asm.idiv(rcx).map_err(encode_err)?;
            }
            _ => {
                let slot = self.spilled_slot(rhs);
                asm.idiv(qword_ptr(rbp + slot_offset(slot)))
                    .map_err(encode_err)?;
            }
        }

        let result = self.ctx.inst_result(inst).expect("div has a result");
        let var = self.alloc.new_variable();
        self.alloc.bind_to_register(var, RAX_ID);
        self.value_vars.insert(result, var);
        Ok(())
    }

    fn emit_call(
        &mut self,
        asm: &mut CodeAssembler,
        func_labels: &HashMap<FuncRef, CodeLabel>,
        inst: InstRef,
        callee: FuncRef,
    ) -> CompileResult<()> {
        // The callee may clobber every allocatable register.
        self.emit_spill_all(asm)?;

        const ARG64_REGS: [AsmRegister64; 6] = [rdi, rsi, rdx, rcx, r8, r9];
        let arg_count = self.ctx.operand_count(inst);
        if arg_count > ARG64_REGS.len() {
            return Err(CompileError::Unsupported(format!(
                "call to `{}` passes more than {} arguments",
                self.ctx.function_name(callee),
                ARG64_REGS.len()
            )));
        }
        for slot_index in 0..arg_count {
            let arg = self
                .ctx
                .operand(inst, slot_index)
                .expect("call argument unset");
            match self.ctx.value_kind(arg) {
                ValueKind::Constant(number) => {
                    asm.mov(ARG64_REGS[slot_index], number).map_err(encode_err)?
                }
                _ => {
                    let slot = self.spilled_slot(arg);
                    asm.mov(ARG64_REGS[slot_index], qword_ptr(rbp + slot_offset(slot)))
                        .map_err(encode_err)?;
                }
            }
        }

        asm.call(func_labels[&callee]).map_err(encode_err)?;

        if let Some(result) = self.ctx.inst_result(inst) {
            let var = self.alloc.new_variable();
            self.alloc.bind_to_register(var, RAX_ID);
            self.value_vars.insert(result, var);
        }
        Ok(())
    }

    /// Stack slot of a non-constant value after a spill-all. Every defined
    /// value is either resident (impossible here) or stored.
    fn spilled_slot(&self, value: ValueRef) -> u32 {
        let var = *self
            .value_vars
            .get(&value)
            .expect("value used before it was defined");
        self.alloc
            .slot_of(var)
            .expect("operand value was never stored")
    }

    /// Store phi incoming values into the staging slots of successor phis.
    /// Must run after a spill-all: sources are read from their slots and
    /// rax is used as scratch.
    fn emit_edge_moves(&mut self, asm: &mut CodeAssembler, block: BlockRef) -> CompileResult<()> {
        for succ in self.ctx.successors(block).collect::<Vec<_>>() {
            for &inst in self.ctx.block_insts(succ).to_vec().iter() {
                if self.ctx.inst_kind(inst) != InstKind::Phi {
                    continue;
                }
                for (pred, value) in self.ctx.phi_incomings(inst) {
                    if pred != block {
                        continue;
                    }
                    match self.ctx.value_kind(value) {
                        ValueKind::Constant(number) => {
                            asm.mov(rax, number).map_err(encode_err)?
                        }
                        _ => {
                            let slot = self.spilled_slot(value);
                            asm.mov(rax, qword_ptr(rbp + slot_offset(slot)))
                                .map_err(encode_err)?;
                        }
                    }
                    let result = self.ctx.inst_result(inst).expect("phi has a result");
                    let staging = self.phi_staging[&result];
                    asm.mov(qword_ptr(rbp + slot_offset(staging)), rax)
                        .map_err(encode_err)?;
                }
            }
        }
        Ok(())
    }
}
