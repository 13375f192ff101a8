// This module implements the register allocator that the code emitter drives while
// walking SSA IR. Allocation is demand-driven: every use of a variable goes through
// get_or_allocate, because the allocator is free to evict any variable between two
// uses. Eviction picks the least-recently-used register-resident variable, assigns it
// a stack slot on first spill, and asks the emitter (through the SpillSink trait) to
// emit the store; re-allocation of a previously spilled variable emits a reload the
// same way. Leaving a block spills everything, which keeps values correct across
// arbitrary control flow without liveness tracking. Register pressure is never an
// error: the stack grows as needed.

//! LRU register allocation with spill-to-stack.

use crate::core::error::CompileResult;

/// Physical register id; an index into the emitter's allocatable set.
pub type RegId = u8;

/// Handle to an abstract variable tracked by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable(u32);

impl Variable {
    fn index(self) -> usize {
        self.0 as usize
    }
}

struct VarData {
    reg: Option<RegId>,
    /// Stack slot index, `None` until the first spill.
    slot: Option<u32>,
    /// Temporaries hold materialized constants; their contents are dead the
    /// moment the consuming instruction is emitted, so eviction drops them
    /// without a store.
    is_tmp: bool,
}

/// Receiver for the loads and stores the allocator decides to emit.
pub trait SpillSink {
    /// Store `reg` into stack slot `slot`.
    fn emit_store(&mut self, reg: RegId, slot: u32) -> CompileResult<()>;
    /// Load stack slot `slot` into `reg`.
    fn emit_reload(&mut self, reg: RegId, slot: u32) -> CompileResult<()>;
}

/// Register allocator state for one function.
pub struct RegAlloc {
    /// Which variable currently occupies each register.
    registers: Vec<Option<Variable>>,
    /// Register-resident variables, least recently used first.
    lru: Vec<Variable>,
    vars: Vec<VarData>,
    /// High-water mark of allocated stack slots.
    frame_slots: u32,
}

impl RegAlloc {
    pub fn new(register_count: usize) -> Self {
        Self {
            registers: vec![None; register_count],
            lru: Vec::new(),
            vars: Vec::new(),
            frame_slots: 0,
        }
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// Create a variable with no register and no stack slot. It has not
    /// been materialized anywhere yet.
    pub fn new_variable(&mut self) -> Variable {
        let var = Variable(self.vars.len() as u32);
        self.vars.push(VarData {
            reg: None,
            slot: None,
            is_tmp: false,
        });
        var
    }

    /// Create a temporary; see [`SpillSink`] note on eviction.
    pub fn new_temp(&mut self) -> Variable {
        let var = self.new_variable();
        self.vars[var.index()].is_tmp = true;
        var
    }

    /// Place a fresh variable into a specific free register, e.g. incoming
    /// function arguments or a call result in the return register.
    pub fn bind_to_register(&mut self, var: Variable, reg: RegId) {
        assert!(
            self.registers[reg as usize].is_none(),
            "register {} already occupied",
            reg
        );
        assert!(self.vars[var.index()].reg.is_none(), "variable already resident");
        self.registers[reg as usize] = Some(var);
        self.vars[var.index()].reg = Some(reg);
        self.lru.push(var);
    }

    pub fn register_of(&self, var: Variable) -> Option<RegId> {
        self.vars[var.index()].reg
    }

    pub fn slot_of(&self, var: Variable) -> Option<u32> {
        self.vars[var.index()].slot
    }

    /// Stack slot of `var`, allocating one if it never spilled.
    pub fn ensure_slot(&mut self, var: Variable) -> u32 {
        if let Some(slot) = self.vars[var.index()].slot {
            return slot;
        }
        let slot = self.frame_slots;
        self.frame_slots += 1;
        self.vars[var.index()].slot = Some(slot);
        slot
    }

    /// Number of stack slots handed out so far.
    pub fn frame_slots(&self) -> u32 {
        self.frame_slots
    }

    /// Get the register holding `var`, allocating (and reloading from its
    /// stack slot if it was spilled before) when it is not resident.
    ///
    /// Must be called on every use: any other allocation may have evicted
    /// the variable since it was last seen.
    pub fn get_or_allocate<S: SpillSink>(
        &mut self,
        sink: &mut S,
        var: Variable,
    ) -> CompileResult<RegId> {
        if let Some(reg) = self.vars[var.index()].reg {
            self.lru_bump(var);
            return Ok(reg);
        }

        let reg = self.allocate_register(sink)?;
        self.registers[reg as usize] = Some(var);
        self.vars[var.index()].reg = Some(reg);
        self.lru.push(var);

        if let Some(slot) = self.vars[var.index()].slot {
            sink.emit_reload(reg, slot)?;
        }
        Ok(reg)
    }

    /// Find a free register, evicting the least-recently-used variable if
    /// none is free.
    fn allocate_register<S: SpillSink>(&mut self, sink: &mut S) -> CompileResult<RegId> {
        if let Some(free) = self.registers.iter().position(|r| r.is_none()) {
            return Ok(free as RegId);
        }

        let victim = *self
            .lru
            .first()
            .expect("all registers occupied but the LRU list is empty");
        let reg = self.vars[victim.index()]
            .reg
            .expect("LRU entry without a register");
        self.spill(sink, victim)?;
        Ok(reg)
    }

    /// Force `var` out of its register, storing it to its stack slot.
    /// No-op when the variable is not register-resident.
    pub fn spill<S: SpillSink>(&mut self, sink: &mut S, var: Variable) -> CompileResult<()> {
        let Some(reg) = self.vars[var.index()].reg else {
            return Ok(());
        };
        if !self.vars[var.index()].is_tmp {
            let slot = self.ensure_slot(var);
            sink.emit_store(reg, slot)?;
            log::trace!("spill r{} -> slot {}", reg, slot);
        }
        self.registers[reg as usize] = None;
        self.vars[var.index()].reg = None;
        let position = self
            .lru
            .iter()
            .position(|&v| v == var)
            .expect("resident variable missing from the LRU list");
        self.lru.remove(position);
        Ok(())
    }

    /// Free a specific register, spilling whoever holds it. Needed when an
    /// instruction clobbers fixed registers.
    pub fn evict_register<S: SpillSink>(&mut self, sink: &mut S, reg: RegId) -> CompileResult<()> {
        match self.registers[reg as usize] {
            Some(var) => self.spill(sink, var),
            None => Ok(()),
        }
    }

    /// Spill every register-resident variable. Called when leaving a block,
    /// which keeps values correct across arbitrary control flow.
    pub fn spill_all<S: SpillSink>(&mut self, sink: &mut S) -> CompileResult<()> {
        for var in self.lru.clone() {
            self.spill(sink, var)?;
        }
        Ok(())
    }

    /// Drop all residency bookkeeping without emitting stores. Valid only
    /// at points where nothing is live, e.g. right after a return.
    pub fn forget_all(&mut self) {
        for var in self.lru.drain(..) {
            self.vars[var.index()].reg = None;
        }
        for reg in self.registers.iter_mut() {
            *reg = None;
        }
    }

    fn lru_bump(&mut self, var: Variable) {
        let position = self
            .lru
            .iter()
            .position(|&v| v == var)
            .expect("resident variable missing from the LRU list");
        self.lru.remove(position);
        self.lru.push(var);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink that records spill traffic instead of emitting code.
    #[derive(Default)]
    struct RecordingSink {
        stores: Vec<(RegId, u32)>,
        reloads: Vec<(RegId, u32)>,
    }

    impl SpillSink for RecordingSink {
        fn emit_store(&mut self, reg: RegId, slot: u32) -> CompileResult<()> {
            self.stores.push((reg, slot));
            Ok(())
        }

        fn emit_reload(&mut self, reg: RegId, slot: u32) -> CompileResult<()> {
            self.reloads.push((reg, slot));
            Ok(())
        }
    }

    #[test]
    fn test_fills_free_registers_first() {
        let mut alloc = RegAlloc::new(3);
        let mut sink = RecordingSink::default();

        let vars: Vec<_> = (0..3).map(|_| alloc.new_variable()).collect();
        let regs: Vec<_> = vars
            .iter()
            .map(|&v| alloc.get_or_allocate(&mut sink, v).unwrap())
            .collect();

        assert_eq!(regs, vec![0, 1, 2]);
        assert!(sink.stores.is_empty());
        assert!(sink.reloads.is_empty());
    }

    #[test]
    fn test_lru_eviction_order() {
        // N+1 variables into an N-register file: the least recently touched
        // one is evicted and gets a stack slot before its register is reused.
        let register_count = 4;
        let mut alloc = RegAlloc::new(register_count);
        let mut sink = RecordingSink::default();

        let vars: Vec<_> = (0..register_count + 1)
            .map(|_| alloc.new_variable())
            .collect();
        for &v in &vars[..register_count] {
            alloc.get_or_allocate(&mut sink, v).unwrap();
        }

        let first_reg = alloc.register_of(vars[0]).unwrap();
        let last_reg = alloc.get_or_allocate(&mut sink, vars[register_count]).unwrap();

        // v1 was least recently touched: it lost its register and was
        // assigned a slot before the register was handed out again.
        assert_eq!(last_reg, first_reg);
        assert_eq!(alloc.register_of(vars[0]), None);
        assert_eq!(alloc.slot_of(vars[0]), Some(0));
        assert_eq!(sink.stores, vec![(first_reg, 0)]);
    }

    #[test]
    fn test_touch_refreshes_lru() {
        let mut alloc = RegAlloc::new(2);
        let mut sink = RecordingSink::default();

        let a = alloc.new_variable();
        let b = alloc.new_variable();
        let c = alloc.new_variable();
        alloc.get_or_allocate(&mut sink, a).unwrap();
        alloc.get_or_allocate(&mut sink, b).unwrap();

        // Touching a makes b the eviction candidate.
        alloc.get_or_allocate(&mut sink, a).unwrap();
        alloc.get_or_allocate(&mut sink, c).unwrap();

        assert!(alloc.register_of(a).is_some());
        assert_eq!(alloc.register_of(b), None);
    }

    #[test]
    fn test_reload_after_spill() {
        let mut alloc = RegAlloc::new(1);
        let mut sink = RecordingSink::default();

        let a = alloc.new_variable();
        let b = alloc.new_variable();
        let reg_a = alloc.get_or_allocate(&mut sink, a).unwrap();
        alloc.get_or_allocate(&mut sink, b).unwrap(); // evicts a

        let reg_a2 = alloc.get_or_allocate(&mut sink, a).unwrap(); // evicts b, reloads a
        assert_eq!(reg_a, reg_a2);
        assert_eq!(sink.stores, vec![(0, 0), (0, 1)]);
        assert_eq!(sink.reloads, vec![(0, 0)]);
    }

    #[test]
    fn test_temps_drop_without_store() {
        let mut alloc = RegAlloc::new(1);
        let mut sink = RecordingSink::default();

        let t = alloc.new_temp();
        let a = alloc.new_variable();
        alloc.get_or_allocate(&mut sink, t).unwrap();
        alloc.get_or_allocate(&mut sink, a).unwrap(); // evicts the temp

        assert!(sink.stores.is_empty());
        assert_eq!(alloc.slot_of(t), None);
        assert_eq!(alloc.frame_slots(), 0);
    }

    #[test]
    fn test_spill_all_empties_registers() {
        let mut alloc = RegAlloc::new(4);
        let mut sink = RecordingSink::default();

        let vars: Vec<_> = (0..3).map(|_| alloc.new_variable()).collect();
        for &v in &vars {
            alloc.get_or_allocate(&mut sink, v).unwrap();
        }
        alloc.spill_all(&mut sink).unwrap();

        assert_eq!(sink.stores.len(), 3);
        for &v in &vars {
            assert_eq!(alloc.register_of(v), None);
            assert!(alloc.slot_of(v).is_some());
        }
    }

    #[test]
    fn test_bind_to_register() {
        let mut alloc = RegAlloc::new(4);
        let mut sink = RecordingSink::default();

        let arg = alloc.new_variable();
        alloc.bind_to_register(arg, 2);
        assert_eq!(alloc.register_of(arg), Some(2));
        assert_eq!(alloc.get_or_allocate(&mut sink, arg).unwrap(), 2);
        assert!(sink.reloads.is_empty());
    }
}
