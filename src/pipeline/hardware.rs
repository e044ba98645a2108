//! Architectural state behind the pipeline: register file, unified
//! memory, and the pipeline registers (stage latches).

use crate::isa::{op_code, Inst, NOP_WORD};

/// Words of unified memory backing both instructions and data.
pub const MEM_SIZE: usize = 2048;
pub const NUM_REGISTERS: usize = 32;
/// Last word index of the instruction half of memory.
pub const INSTR_MEM_END: u32 = 1023;
/// First word index of the data half of memory.
pub const DATA_MEM_START: u32 = 1024;

/// Register file with a hardwired-zero R0.
pub struct RegisterFile {
    state: [i32; NUM_REGISTERS],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self { state: [0; NUM_REGISTERS] }
    }
}

impl RegisterFile {
    pub fn read(&self, reg: u8) -> i32 {
        self.state[reg as usize]
    }

    /// Returns whether the write landed; writes to R0 are suppressed.
    pub fn write(&mut self, reg: u8, val: i32) -> bool {
        if reg == 0 {
            return false;
        }
        self.state[reg as usize] = val;
        true
    }

    pub fn as_array(&self) -> &[i32; NUM_REGISTERS] {
        &self.state
    }
}

/// Unified word-addressed memory with a single port. Instruction fetch
/// uses [`Memory::fetch`]; LW/SW go through the bounds-checked data port.
pub struct Memory {
    words: [u32; MEM_SIZE],
}

impl Default for Memory {
    fn default() -> Self {
        Self { words: [0; MEM_SIZE] }
    }
}

impl Memory {
    pub fn load_program(&mut self, program: &[u32]) {
        for (cell, word) in self.words.iter_mut().zip(program) {
            *cell = *word;
        }
    }

    /// Instruction port. The caller guarantees `addr` is in range.
    pub fn fetch(&self, addr: u32) -> u32 {
        self.words[addr as usize]
    }

    /// Data port read; `None` outside the data half of memory.
    pub fn load(&self, addr: i32) -> Option<u32> {
        if (DATA_MEM_START as i32..MEM_SIZE as i32).contains(&addr) {
            Some(self.words[addr as usize])
        } else {
            None
        }
    }

    /// Data port write; returns whether the store landed.
    pub fn store(&mut self, addr: i32, val: i32) -> bool {
        if (DATA_MEM_START as i32..MEM_SIZE as i32).contains(&addr) {
            self.words[addr as usize] = val as u32;
            true
        } else {
            false
        }
    }

    pub fn as_array(&self) -> &[u32; MEM_SIZE] {
        &self.words
    }
}

/// Pipeline register: the state of one in-flight instruction between two
/// stages. A stage holds `Option<Latch>`; `None` is a bubble.
#[derive(Debug, Clone, Copy)]
pub struct Latch {
    /// raw encoded word
    pub raw: u32,
    /// PC this instruction was fetched at
    pub pc: u32,
    /// cycles spent in the current stage (ID and EX take two)
    pub cycles: u8,
    /// decoded form, populated by ID's second cycle
    pub inst: Option<Inst>,
    /// resolved R1 source value (BNE compare operand / SW store value)
    pub r1_val: i32,
    /// resolved R2 source value
    pub r2_val: i32,
    /// resolved R3 source value
    pub r3_val: i32,
    /// ALU result or effective address
    pub alu_out: i32,
    /// value read by LW in MEM
    pub mem_out: i32,
}

impl Latch {
    pub fn fetched(raw: u32, pc: u32) -> Self {
        Self {
            raw,
            pc,
            cycles: 0,
            inst: None,
            r1_val: 0,
            r2_val: 0,
            r3_val: 0,
            alu_out: 0,
            mem_out: 0,
        }
    }

    /// Synthetic NOP fed into IF once the program is exhausted.
    pub fn drain_nop(pc: u32) -> Self {
        Self { inst: Some(Inst::Nop), ..Self::fetched(NOP_WORD, pc) }
    }

    /// Opcode field of the raw word; valid before full decode.
    pub fn opcode(&self) -> u8 {
        (self.raw >> 28) as u8
    }

    pub fn name(&self) -> &'static str {
        op_code::name_of(self.opcode())
    }

    /// Copy latched into the next stage at the end of a cycle.
    pub fn restarted(&self) -> Self {
        Self { cycles: 0, ..*self }
    }
}
