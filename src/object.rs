//! Binary representation of an assembled program

use std::fmt::Display;

use crate::isa::Inst;

/// One source line annotated with its address and encoded instruction.
#[derive(Debug)]
pub struct SourceInfo {
    pub addr: u32,
    pub inst: Inst,
    pub src: String,
}

/// Assembled program: one encoded word per instruction, in load order,
/// plus the per-line annotations used for listings.
#[derive(Debug, Default)]
pub struct Object {
    pub words: Vec<u32>,
    pub source: Vec<SourceInfo>,
}

impl Display for Object {
    /// display the program listing, one `address: word | source` row per line
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for info in &self.source {
            writeln!(f, "{:#06x}: {:08X} | {}", info.addr, info.inst.encode(), info.src)?;
        }
        Ok(())
    }
}
