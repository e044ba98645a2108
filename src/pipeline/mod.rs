//! Cycle-accurate five-stage pipeline simulator.
//!
//! All architectural and control state lives in [`Simulator`];
//! [`Simulator::step`] advances the machine by one clock cycle. Stages
//! are invoked in reverse order (WB first) so that forwarding sources are
//! up to date when ID resolves operands, and so a branch resolved in EX
//! can flush IF/ID before the latches advance. Instruction fetch and
//! memory access share the single memory port: IF runs on odd cycles,
//! MEM on even ones.

mod forward;
pub mod hardware;
mod stages;

use ansi_term::{Colour::Red, Style};

use crate::isa::op_code;
use hardware::{Latch, Memory, RegisterFile, MEM_SIZE, NUM_REGISTERS};

macro_rules! trace {
    ($on:expr, $($arg:tt)*) => {
        if $on {
            println!($($arg)*)
        }
    };
}
pub(crate) use trace;

/// Hazard counters accumulated over a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    /// operand values bypassed from the EX/MEM/WB latches
    pub forwards: u64,
    /// cycles lost to load-use stalls
    pub load_use_stalls: u64,
    /// control flushes caused by taken branches and jumps
    pub flushes: u64,
}

/// Pipeline simulator.
pub struct Simulator {
    pub(crate) memory: Memory,
    pub(crate) regs: RegisterFile,
    pub(crate) pc: u32,
    pub(crate) cycle: u64,
    pub(crate) instructions_loaded: u32,

    pub(crate) if_stage: Option<Latch>,
    pub(crate) id_stage: Option<Latch>,
    pub(crate) ex_stage: Option<Latch>,
    pub(crate) mem_stage: Option<Latch>,
    pub(crate) wb_stage: Option<Latch>,

    /// an odd-cycle branch resolution reserves the port for MEM next
    /// cycle, so the redirected fetch waits one extra cycle
    stall_if_after_branch: bool,
    empty_pipeline_cycles: u32,
    terminate: bool,
    /// whether to print the per-cycle trace
    pub(crate) tty_out: bool,
    pub(crate) stats: Stats,
}

impl Simulator {
    /// Initialize the simulator with a program image.
    ///
    /// tty_out: whether to print the per-cycle trace
    pub fn new(program: &[u32], tty_out: bool) -> Self {
        let mut memory = Memory::default();
        memory.load_program(program);
        Self {
            memory,
            regs: RegisterFile::default(),
            pc: 0,
            cycle: 0,
            instructions_loaded: program.len() as u32,
            if_stage: None,
            id_stage: None,
            ex_stage: None,
            mem_stage: None,
            wb_stage: None,
            stall_if_after_branch: false,
            empty_pipeline_cycles: 0,
            terminate: false,
            tty_out,
            stats: Stats::default(),
        }
    }

    pub fn is_terminate(&self) -> bool {
        self.terminate
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle
    }

    pub fn program_counter(&self) -> u32 {
        self.pc
    }

    pub fn registers(&self) -> &[i32; NUM_REGISTERS] {
        self.regs.as_array()
    }

    pub fn mem(&self) -> &[u32; MEM_SIZE] {
        self.memory.as_array()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Advance the machine by one clock cycle.
    pub fn step(&mut self) {
        self.cycle += 1;
        trace!(
            self.tty_out,
            "\n{}",
            Style::new().bold().paint(format!(
                "=============== Cycle {:3} =============== (PC before fetch: {})",
                self.cycle, self.pc
            ))
        );

        let mut can_if = self.cycle % 2 == 1;
        let can_mem = self.cycle % 2 == 0;
        if self.stall_if_after_branch {
            can_if = false;
            self.stall_if_after_branch = false;
            trace!(
                self.tty_out,
                "{}",
                Red.bold().paint(format!(
                    "Cycle {}: Control - IF stalled due to MEM access by prior branch/jump.",
                    self.cycle
                ))
            );
        }

        self.print_state(can_if);

        // downstream stages first, so ID sees this cycle's results
        self.write_back_op();
        if can_mem {
            self.memory_op();
        }
        let branch = self.execute_op();

        let mut suppress_if = false;
        if let Some(target) = branch {
            trace!(
                self.tty_out,
                "{}",
                Red.bold().paint(format!(
                    "Cycle {}: Control - Branch/Jump taken in EX to PC 0x{:X}. Flushing ID & IF contents.",
                    self.cycle, target
                ))
            );
            self.pc = target;
            self.id_stage = None;
            self.if_stage = None;
            suppress_if = true;
            if self.cycle % 2 == 1 {
                self.stall_if_after_branch = true;
                trace!(
                    self.tty_out,
                    "{}",
                    Red.bold().paint(format!(
                        "Cycle {}: Control - Scheduling IF stall for next cycle (Cycle {}) due to branch.",
                        self.cycle,
                        self.cycle + 1
                    ))
                );
            }
            self.stats.flushes += 1;
        }

        let hazard = self.decode_op();
        if hazard {
            can_if = false;
            self.stats.load_use_stalls += 1;
            trace!(
                self.tty_out,
                "{}",
                Red.bold().paint(format!(
                    "Cycle {}: Control - Pipeline stalled for load-use hazard.",
                    self.cycle
                ))
            );
        } else if can_if && !suppress_if {
            self.fetch_op();
        } else if suppress_if {
            trace!(self.tty_out, "Cycle {}: IF - Suppressed due to branch taken in EX.", self.cycle);
            self.if_stage = None;
        }

        self.advance_latches(can_if, can_mem, suppress_if, hazard);
        self.check_halt();
    }

    /// End-of-cycle latch advance. A producer hands its latch to the next
    /// stage once it has completed its cycles (two for ID and EX, one
    /// otherwise); a consumer that receives nothing becomes a bubble
    /// unless it is itself still mid-stage.
    fn advance_latches(&mut self, can_if: bool, can_mem: bool, suppress_if: bool, hazard: bool) {
        self.wb_stage = match &self.mem_stage {
            Some(l) if can_mem => Some(l.restarted()),
            _ => None,
        };

        self.mem_stage = match &self.ex_stage {
            Some(l) if l.cycles == 2 => Some(l.restarted()),
            _ => match &self.mem_stage {
                // arrived while the port belonged to IF; the access
                // happens on the next even cycle
                Some(l) if !can_mem => Some(*l),
                _ => None,
            },
        };

        self.ex_stage = match &self.id_stage {
            Some(l) if l.cycles == 2 && !hazard => Some(l.restarted()),
            _ => match &self.ex_stage {
                Some(l) if l.cycles == 1 => Some(*l),
                _ => None,
            },
        };

        self.id_stage = match &self.if_stage {
            Some(l) if can_if && !suppress_if && !hazard => Some(l.restarted()),
            _ => match &self.id_stage {
                Some(l) if l.cycles == 1 => Some(*l),
                _ => None,
            },
        };
    }

    /// Halt once the program is exhausted and nothing but drain NOPs is
    /// left in flight, with a hard cycle cap as a safety net.
    fn check_halt(&mut self) {
        let loaded = self.instructions_loaded;
        let drained = loaded > 0
            && self.pc >= loaded
            && [&self.if_stage, &self.id_stage, &self.ex_stage, &self.mem_stage, &self.wb_stage]
                .into_iter()
                .all(|l| match l {
                    None => true,
                    Some(l) => l.opcode() == op_code::NOP && l.pc >= loaded,
                });
        if drained {
            self.empty_pipeline_cycles += 1;
            if self.empty_pipeline_cycles > 2 {
                self.terminate = true;
                trace!(
                    self.tty_out,
                    "\nHALT: PC ({}) past end of program ({} instructions); pipeline drained for {} cycles.",
                    self.pc,
                    loaded,
                    self.empty_pipeline_cycles
                );
            }
        } else {
            self.empty_pipeline_cycles = 0;
        }

        if loaded > 0 && self.cycle > loaded as u64 + 30 {
            self.terminate = true;
            trace!(
                self.tty_out,
                "\nHALT: Cycle limit safety break ({} cycles for {} instructions).",
                self.cycle,
                loaded
            );
        }
        if loaded == 0 && self.cycle > 10 {
            self.terminate = true;
            trace!(self.tty_out, "\nHALT: No program loaded after 10 cycles.");
        }
    }

    // print stage contents at the beginning of a cycle
    fn print_state(&self, can_if: bool) {
        if !self.tty_out {
            return;
        }
        println!("--- Pipeline Stage Contents (Start of Cycle {}) ---", self.cycle);
        if can_if && (self.pc as usize) < MEM_SIZE {
            println!(
                "IF (fetch buffer) : Instr PC {:2}, Raw 0x{:08X}, Valid: F, Opcode: {:<4}",
                self.pc,
                self.memory.fetch(self.pc),
                "---"
            );
        } else {
            println!(
                "IF (fetch buffer) : Instr PC {:2}, Raw 0x{:08X}, Valid: F, Opcode: {:<4}",
                -1, 0, "---"
            );
        }
        match &self.id_stage {
            Some(l) => println!(
                "ID                : Instr PC {:2}, Raw 0x{:08X}, Valid: T, Opcode: {:<4}, CycInStg: {}",
                l.pc, l.raw, l.name(), l.cycles
            ),
            None => println!(
                "ID                : Instr PC {:2}, Raw 0x{:08X}, Valid: F, Opcode: {:<4}, CycInStg: 0",
                -1, 0, "---"
            ),
        }
        match &self.ex_stage {
            Some(l) => println!(
                "EX                : Instr PC {:2}, Raw 0x{:08X}, Valid: T, Opcode: {:<4}, CycInStg: {}, ALU: {}",
                l.pc, l.raw, l.name(), l.cycles, l.alu_out
            ),
            None => println!(
                "EX                : Instr PC {:2}, Raw 0x{:08X}, Valid: F, Opcode: {:<4}, CycInStg: 0, ALU: 0",
                -1, 0, "---"
            ),
        }
        match &self.mem_stage {
            Some(l) => println!(
                "MEM               : Instr PC {:2}, Raw 0x{:08X}, Valid: T, Opcode: {:<4}, MemRead: {}",
                l.pc, l.raw, l.name(), l.mem_out
            ),
            None => println!(
                "MEM               : Instr PC {:2}, Raw 0x{:08X}, Valid: F, Opcode: {:<4}, MemRead: 0",
                -1, 0, "---"
            ),
        }
        match &self.wb_stage {
            Some(l) => println!(
                "WB                : Instr PC {:2}, Raw 0x{:08X}, Valid: T, Opcode: {:<4}",
                l.pc, l.raw, l.name()
            ),
            None => println!(
                "WB                : Instr PC {:2}, Raw 0x{:08X}, Valid: F, Opcode: {:<4}",
                -1, 0, "---"
            ),
        }
        println!("-----------------------------------------------------------------------");
    }
}
