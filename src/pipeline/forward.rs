//! Operand forwarding network and load-use hazard detection.
//!
//! In-flight values are read from the stage latches, never from the
//! register file; the register file is only the fallback when no
//! younger producer is found.

use super::hardware::{Latch, RegisterFile};
use super::{trace, Stats};
use crate::isa::{op_code, Inst};

/// Resolve one source operand for the instruction decoding in ID.
///
/// Producers are walked newest-first: the EX latch (only in its second
/// cycle, when the ALU result just became available), then MEM, then WB.
/// A producer matches when its destination register equals `reg`; BNE, J,
/// SW and NOP have no destination and never forward. R0 is always zero.
pub(super) fn resolve_source(
    reg: u8,
    ex: Option<&Latch>,
    mem: Option<&Latch>,
    wb: Option<&Latch>,
    regs: &RegisterFile,
    cycle: u64,
    tty_out: bool,
    stats: &mut Stats,
) -> i32 {
    if reg == 0 {
        return 0;
    }
    if let Some(l) = ex {
        if l.cycles == 2 && l.inst.and_then(|i| i.dest()) == Some(reg) {
            trace!(tty_out, "Cycle {}: ID - Forwarding R{} value {} from EX", cycle, reg, l.alu_out);
            stats.forwards += 1;
            return l.alu_out;
        }
    }
    for (latch, stage) in [(mem, "MEM"), (wb, "WB")] {
        if let Some(l) = latch {
            if l.inst.and_then(|i| i.dest()) == Some(reg) {
                let val = if l.opcode() == op_code::LW { l.mem_out } else { l.alu_out };
                trace!(tty_out, "Cycle {}: ID - Forwarding R{} value {} from {}", cycle, reg, val, stage);
                stats.forwards += 1;
                return val;
            }
        }
    }
    regs.read(reg)
}

/// A load in EX whose destination is about to be read by the instruction
/// in ID cannot be bypassed; the consumer has to sit out one cycle.
/// Returns the hazard register.
pub(super) fn load_use_hazard(consumer: &Inst, ex: Option<&Latch>) -> Option<u8> {
    let producer = ex?;
    let Some(Inst::I { op: op_code::LW, r1: dest, .. }) = producer.inst else {
        return None;
    };
    if dest == 0 {
        return None;
    }
    consumer.src_regs().into_iter().flatten().any(|s| s == dest).then_some(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer(inst: Inst, cycles: u8, alu_out: i32, mem_out: i32) -> Latch {
        Latch {
            cycles,
            inst: Some(inst),
            alu_out,
            mem_out,
            ..Latch::fetched(inst.encode(), 0)
        }
    }

    fn addi(r1: u8) -> Inst {
        Inst::I { op: op_code::ADDI, r1, r2: 0, imm: 0 }
    }

    fn lw(r1: u8) -> Inst {
        Inst::I { op: op_code::LW, r1, r2: 0, imm: 0 }
    }

    #[test]
    fn test_forward_priority() {
        let mut regs = RegisterFile::default();
        assert!(regs.write(4, 1));
        let ex = producer(addi(4), 2, 10, 0);
        let mem = producer(addi(4), 0, 20, 0);
        let wb = producer(lw(4), 0, 0, 30);
        let mut stats = Stats::default();

        // newest producer wins
        let v = resolve_source(4, Some(&ex), Some(&mem), Some(&wb), &regs, 1, false, &mut stats);
        assert_eq!(v, 10);
        // EX only forwards once its result exists (2nd cycle)
        let ex1 = producer(addi(4), 1, 10, 0);
        let v = resolve_source(4, Some(&ex1), Some(&mem), Some(&wb), &regs, 1, false, &mut stats);
        assert_eq!(v, 20);
        // LW in WB forwards the loaded value, not the address
        let v = resolve_source(4, None, None, Some(&wb), &regs, 1, false, &mut stats);
        assert_eq!(v, 30);
        // no producer: register file
        let v = resolve_source(4, None, None, None, &regs, 1, false, &mut stats);
        assert_eq!(v, 1);
        assert_eq!(stats.forwards, 3);
    }

    #[test]
    fn test_non_writers_do_not_forward() {
        let regs = RegisterFile::default();
        let mut stats = Stats::default();
        for inst in [
            Inst::I { op: op_code::BNE, r1: 4, r2: 0, imm: 0 },
            Inst::I { op: op_code::SW, r1: 4, r2: 0, imm: 0 },
            Inst::J { addr: 0 },
            Inst::Nop,
        ] {
            let mem = producer(inst, 0, 99, 99);
            let v = resolve_source(4, None, Some(&mem), None, &regs, 1, false, &mut stats);
            assert_eq!(v, 0, "{inst:?} must not forward");
        }
        // R0 never resolves to a forwarded value
        let mem = producer(addi(0), 0, 99, 0);
        let v = resolve_source(0, None, Some(&mem), None, &regs, 1, false, &mut stats);
        assert_eq!(v, 0);
        assert_eq!(stats.forwards, 0);
    }

    #[test]
    fn test_load_use_hazard() {
        let ex = producer(lw(2), 2, 0, 0);
        let add = Inst::R { op: op_code::ADD, r1: 3, r2: 2, r3: 1, shamt: 0 };
        assert_eq!(load_use_hazard(&add, Some(&ex)), Some(2));
        // destination slot does not count as a source
        let add_dest_only = Inst::R { op: op_code::ADD, r1: 2, r2: 1, r3: 1, shamt: 0 };
        assert_eq!(load_use_hazard(&add_dest_only, Some(&ex)), None);
        // shift amount slot is exempt
        let sll = Inst::R { op: op_code::SLL, r1: 3, r2: 1, r3: 0, shamt: 2 };
        assert_eq!(load_use_hazard(&sll, Some(&ex)), None);
        // non-load producers do not stall
        let ex_add = producer(addi(2), 2, 0, 0);
        assert_eq!(load_use_hazard(&add, Some(&ex_add)), None);
        assert_eq!(load_use_hazard(&add, None), None);
    }
}
