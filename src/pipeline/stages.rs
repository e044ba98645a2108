//! The five per-stage operations.
//!
//! Each operation works on the stage's own latch and the architectural
//! state; the cycle controller in the parent module decides which stages
//! run in a given cycle and in what order. ID and EX hold their
//! instruction for two cycles; IF, MEM and WB take one.

use super::forward;
use super::hardware::{Latch, INSTR_MEM_END};
use super::{trace, Simulator};
use crate::isa::{op_code, Inst, NOP_WORD};

impl Simulator {
    /// IF: read the word at PC into the fetch latch and advance PC.
    /// Past the end of the program a synthetic NOP is fed in instead,
    /// which drains the pipeline without injecting further work.
    pub(super) fn fetch_op(&mut self) {
        if self.pc < self.instructions_loaded && self.pc <= INSTR_MEM_END {
            let raw = self.memory.fetch(self.pc);
            let latch = Latch::fetched(raw, self.pc);
            trace!(self.tty_out, "Cycle {}: IF - Inputs: PC={}", self.cycle, self.pc);
            trace!(
                self.tty_out,
                "Cycle {}: IF - Fetched instr {} (0x{:08X}, {}) from Mem[{}].",
                self.cycle,
                self.pc,
                raw,
                latch.name(),
                self.pc
            );
            trace!(
                self.tty_out,
                "Cycle {}: IF - Outputs: RawInstr=0x{:08X}, NextPC={}",
                self.cycle,
                raw,
                self.pc + 1
            );
            self.if_stage = Some(latch);
            self.pc += 1;
        } else {
            if self.pc > INSTR_MEM_END {
                trace!(
                    self.tty_out,
                    "Cycle {}: IF - PC ({}) out of instruction memory. Fetching NOP.",
                    self.cycle,
                    self.pc
                );
            }
            trace!(self.tty_out, "Cycle {}: IF - Inputs: PC={}", self.cycle, self.pc);
            trace!(
                self.tty_out,
                "Cycle {}: IF - Fetched NOP (0x{:08X}) for PC={}.",
                self.cycle,
                NOP_WORD,
                self.pc
            );
            trace!(
                self.tty_out,
                "Cycle {}: IF - Outputs: RawInstr=0x{:08X}, NextPC={}",
                self.cycle,
                NOP_WORD,
                self.pc
            );
            self.if_stage = Some(Latch::drain_nop(self.pc));
        }
    }

    /// ID: first cycle extracts the opcode, second cycle decodes the full
    /// word, resolves source operands through the forwarding network and
    /// checks for a load-use hazard. Returns whether a hazard was raised;
    /// if so the latch stays put and re-runs its second cycle next tick.
    pub(super) fn decode_op(&mut self) -> bool {
        let Some(id) = self.id_stage.as_mut() else { return false };
        id.cycles += 1;

        if id.cycles == 1 {
            trace!(self.tty_out, "Cycle {}: ID - Inputs: RawInstr=0x{:08X}", self.cycle, id.raw);
            trace!(
                self.tty_out,
                "Cycle {}: ID - Instr {} (0x{:08X}, {}) entered ID (1st cycle).",
                self.cycle,
                id.pc,
                id.raw,
                id.name()
            );
            trace!(self.tty_out, "Cycle {}: ID - Outputs: Opcode={}", self.cycle, id.name());
            return false;
        }

        trace!(self.tty_out, "Cycle {}: ID - Inputs: RawInstr=0x{:08X}", self.cycle, id.raw);
        let inst = match Inst::decode(id.raw) {
            Some(inst) => inst,
            None => {
                trace!(
                    self.tty_out,
                    "Cycle {}: ID - Instr {} - Unknown opcode 0x{:X}. Treating as NOP.",
                    self.cycle,
                    id.pc,
                    id.opcode()
                );
                id.raw = NOP_WORD;
                Inst::Nop
            }
        };

        if let Some(reg) = forward::load_use_hazard(&inst, self.ex_stage.as_ref()) {
            trace!(
                self.tty_out,
                "Cycle {}: ID - Load-use hazard detected on R{}. Stalling pipeline.",
                self.cycle,
                reg
            );
            // stay in the 2nd ID cycle; it re-runs next tick
            id.cycles -= 1;
            return true;
        }

        match inst {
            Inst::R { r2, r3, .. } => {
                id.r2_val = forward::resolve_source(
                    r2,
                    self.ex_stage.as_ref(),
                    self.mem_stage.as_ref(),
                    self.wb_stage.as_ref(),
                    &self.regs,
                    self.cycle,
                    self.tty_out,
                    &mut self.stats,
                );
                id.r3_val = forward::resolve_source(
                    r3,
                    self.ex_stage.as_ref(),
                    self.mem_stage.as_ref(),
                    self.wb_stage.as_ref(),
                    &self.regs,
                    self.cycle,
                    self.tty_out,
                    &mut self.stats,
                );
            }
            Inst::I { op, r1, r2, .. } => {
                if op == op_code::BNE || op == op_code::SW {
                    id.r1_val = forward::resolve_source(
                        r1,
                        self.ex_stage.as_ref(),
                        self.mem_stage.as_ref(),
                        self.wb_stage.as_ref(),
                        &self.regs,
                        self.cycle,
                        self.tty_out,
                        &mut self.stats,
                    );
                }
                id.r2_val = forward::resolve_source(
                    r2,
                    self.ex_stage.as_ref(),
                    self.mem_stage.as_ref(),
                    self.wb_stage.as_ref(),
                    &self.regs,
                    self.cycle,
                    self.tty_out,
                    &mut self.stats,
                );
            }
            Inst::J { .. } | Inst::Nop => {}
        }
        id.inst = Some(inst);

        trace!(
            self.tty_out,
            "Cycle {}: ID - Instr {} ({}) decoded (2nd cycle).",
            self.cycle,
            id.pc,
            inst.name()
        );
        match inst {
            Inst::R { r1, r2, r3, shamt, .. } => trace!(
                self.tty_out,
                "Cycle {}: ID - Outputs: Type=R, R1={}, R2={}, R3={}, R2_val={}, R3_val={}, Shamt={}",
                self.cycle,
                r1,
                r2,
                r3,
                id.r2_val,
                id.r3_val,
                shamt
            ),
            Inst::I { r1, r2, imm, .. } => trace!(
                self.tty_out,
                "Cycle {}: ID - Outputs: Type=I, R1={}, R2={}, R1_val={}, R2_val={}, Imm={}",
                self.cycle,
                r1,
                r2,
                id.r1_val,
                id.r2_val,
                imm
            ),
            Inst::J { addr } => {
                trace!(self.tty_out, "Cycle {}: ID - Outputs: Type=J, Addr={}", self.cycle, addr)
            }
            Inst::Nop => trace!(self.tty_out, "Cycle {}: ID - Outputs: Type=N", self.cycle),
        }
        false
    }

    /// EX: the first cycle models ALU latency and computes nothing; the
    /// second performs the operation. A taken branch or jump is reported
    /// back to the controller as the new PC, not applied here.
    pub(super) fn execute_op(&mut self) -> Option<u32> {
        let ex = self.ex_stage.as_mut()?;
        let inst = ex.inst?;
        ex.cycles += 1;
        if inst == Inst::Nop {
            return None;
        }

        if ex.cycles == 1 {
            match inst {
                Inst::R { shamt, .. } => trace!(
                    self.tty_out,
                    "Cycle {}: EX - Inputs: Type=R, R2_val={}, R3_val={}, Shamt={}",
                    self.cycle,
                    ex.r2_val,
                    ex.r3_val,
                    shamt
                ),
                Inst::I { imm, .. } => trace!(
                    self.tty_out,
                    "Cycle {}: EX - Inputs: Type=I, R1_val={}, R2_val={}, Imm={}",
                    self.cycle,
                    ex.r1_val,
                    ex.r2_val,
                    imm
                ),
                Inst::J { addr } => {
                    trace!(self.tty_out, "Cycle {}: EX - Inputs: Type=J, Addr={}", self.cycle, addr)
                }
                Inst::Nop => {}
            }
            trace!(
                self.tty_out,
                "Cycle {}: EX - Instr {} ({}) entered EX (1st cycle).",
                self.cycle,
                ex.pc,
                inst.name()
            );
            trace!(self.tty_out, "Cycle {}: EX - Outputs: None (1st cycle)", self.cycle);
            return None;
        }

        let mut branch = None;
        match inst {
            Inst::R { op: op_code::ADD, .. } => ex.alu_out = ex.r2_val.wrapping_add(ex.r3_val),
            Inst::R { op: op_code::SUB, .. } => ex.alu_out = ex.r2_val.wrapping_sub(ex.r3_val),
            Inst::R { op: op_code::SLL, shamt, .. } => ex.alu_out = ex.r2_val.wrapping_shl(shamt),
            Inst::R { op: op_code::SRL, shamt, .. } => {
                // logical shift: zero-fill
                ex.alu_out = (ex.r2_val as u32).wrapping_shr(shamt) as i32;
            }
            Inst::I { op: op_code::MULI, imm, .. } => ex.alu_out = ex.r2_val.wrapping_mul(imm),
            Inst::I { op: op_code::ADDI, imm, .. } => ex.alu_out = ex.r2_val.wrapping_add(imm),
            Inst::I { op: op_code::ANDI, imm, .. } => ex.alu_out = ex.r2_val & imm,
            Inst::I { op: op_code::ORI, imm, .. } => ex.alu_out = ex.r2_val | imm,
            Inst::I { op: op_code::BNE, imm, .. } => {
                if ex.r1_val != ex.r2_val {
                    branch = Some(ex.pc.wrapping_add(1).wrapping_add(imm as u32));
                    ex.alu_out = 1;
                } else {
                    ex.alu_out = 0;
                }
            }
            Inst::I { op: op_code::LW, imm, .. } | Inst::I { op: op_code::SW, imm, .. } => {
                ex.alu_out = ex.r2_val.wrapping_add(imm);
            }
            Inst::J { addr } => {
                // upper PC bits carried over, MIPS style
                branch = Some((ex.pc.wrapping_add(1) & 0xF000_0000) | (addr & 0x0FFF_FFFF));
            }
            _ => ex.alu_out = 0,
        }

        trace!(
            self.tty_out,
            "Cycle {}: EX - Instr {} ({}) executed (2nd cycle).",
            self.cycle,
            ex.pc,
            inst.name()
        );
        trace!(
            self.tty_out,
            "Cycle {}: EX - Outputs: ALU/Addr={}, BranchTaken={}",
            self.cycle,
            ex.alu_out,
            if branch.is_some() { "YES" } else { "NO" }
        );
        branch
    }

    /// MEM: LW reads and SW writes the data half of memory; everything
    /// else passes through. Out-of-range reads yield 0, out-of-range
    /// writes are dropped; both are reported.
    pub(super) fn memory_op(&mut self) {
        let Some(m) = self.mem_stage.as_mut() else { return };
        let Some(inst) = m.inst else { return };
        if inst == Inst::Nop {
            return;
        }
        m.cycles = 1;
        let addr = m.alu_out;

        trace!(
            self.tty_out,
            "Cycle {}: MEM - Inputs: ALU/Addr={}, R1_val={}",
            self.cycle,
            addr,
            m.r1_val
        );
        match inst {
            Inst::I { op: op_code::LW, .. } => match self.memory.load(addr) {
                Some(val) => {
                    m.mem_out = val as i32;
                    trace!(
                        self.tty_out,
                        "Cycle {}: MEM - Instr {} (LW) from Addr {}. Read val: {}",
                        self.cycle,
                        m.pc,
                        addr,
                        m.mem_out
                    );
                    trace!(
                        self.tty_out,
                        "Cycle {}: MEM - Outputs: MemReadVal={}",
                        self.cycle,
                        m.mem_out
                    );
                }
                None => {
                    m.mem_out = 0;
                    trace!(
                        self.tty_out,
                        "Cycle {}: MEM - Instr {} (LW) - Error! Invalid mem read addr: {}. Reading 0.",
                        self.cycle,
                        m.pc,
                        addr
                    );
                    trace!(self.tty_out, "Cycle {}: MEM - Outputs: MemReadVal=0", self.cycle);
                }
            },
            Inst::I { op: op_code::SW, r1, .. } => {
                if self.memory.store(addr, m.r1_val) {
                    trace!(
                        self.tty_out,
                        "Cycle {}: MEM - Instr {} (SW) to Addr {}. Wrote val: {} (from R{})",
                        self.cycle,
                        m.pc,
                        addr,
                        m.r1_val,
                        r1
                    );
                    trace!(
                        self.tty_out,
                        "Cycle {}: MEM - Memory[0x{:04X}] changed to {} in MEM stage",
                        self.cycle,
                        addr,
                        m.r1_val
                    );
                    trace!(
                        self.tty_out,
                        "Cycle {}: MEM - Outputs: None (write completed)",
                        self.cycle
                    );
                } else {
                    trace!(
                        self.tty_out,
                        "Cycle {}: MEM - Instr {} (SW) - Error! Invalid mem write addr: {}. Write ignored.",
                        self.cycle,
                        m.pc,
                        addr
                    );
                    trace!(
                        self.tty_out,
                        "Cycle {}: MEM - Outputs: None (write ignored)",
                        self.cycle
                    );
                }
            }
            _ => {
                trace!(
                    self.tty_out,
                    "Cycle {}: MEM - Outputs: None (no memory operation)",
                    self.cycle
                );
            }
        }
    }

    /// WB: ALU producers write their result, LW writes the loaded value;
    /// BNE, J, SW and NOP write nothing. Writes to R0 are suppressed.
    pub(super) fn write_back_op(&mut self) {
        let Some(w) = self.wb_stage.as_mut() else { return };
        let Some(inst) = w.inst else { return };
        if inst == Inst::Nop {
            return;
        }
        w.cycles = 1;

        trace!(
            self.tty_out,
            "Cycle {}: WB - Inputs: ALUResult={}, MemReadVal={}",
            self.cycle,
            w.alu_out,
            w.mem_out
        );
        match inst.dest() {
            Some(reg) => {
                let val = if inst.opcode() == op_code::LW { w.mem_out } else { w.alu_out };
                if self.regs.write(reg, val) {
                    trace!(
                        self.tty_out,
                        "Cycle {}: WB - Instr {} ({}) wrote {} to R{}.",
                        self.cycle,
                        w.pc,
                        inst.name(),
                        val,
                        reg
                    );
                    trace!(
                        self.tty_out,
                        "Cycle {}: WB - Register R{} changed to {} in WB stage",
                        self.cycle,
                        reg,
                        val
                    );
                } else {
                    trace!(
                        self.tty_out,
                        "Cycle {}: WB - Instr {} ({}) - Attempted write to R0 with value {}. Suppressed.",
                        self.cycle,
                        w.pc,
                        inst.name(),
                        val
                    );
                    trace!(
                        self.tty_out,
                        "Cycle {}: WB - Register R0 change to {} suppressed in WB stage",
                        self.cycle,
                        val
                    );
                }
                trace!(self.tty_out, "Cycle {}: WB - Outputs: R{}={}", self.cycle, reg, val);
            }
            None => {
                trace!(self.tty_out, "Cycle {}: WB - Outputs: None (no write-back)", self.cycle);
            }
        }
    }
}
