use ansi_term::{Colour, Style};

use crate::isa::op_code;
use crate::pipeline::hardware::{DATA_MEM_START, INSTR_MEM_END, MEM_SIZE, NUM_REGISTERS};

fn gray() -> Style {
    Colour::Fixed(8).normal()
}

/// Parse a numeric literal from the assembly source: decimal or
/// 0x-prefixed hex, optionally negated.
pub(crate) fn parse_literal(s: &str) -> Option<i64> {
    if let Ok(r) = s.parse() {
        return Some(r);
    }
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let num = i64::from_str_radix(body.strip_prefix("0x")?, 16).ok()?;
    Some(if neg { -num } else { num })
}

fn format_value(val: i32) -> String {
    let s = format!("{:10} (0x{:08X})", val, val as u32);
    if val == 0 {
        gray().paint(s).to_string()
    } else {
        s
    }
}

/// Print the final register file, four registers per row.
pub fn reg_dump(regs: &[i32; NUM_REGISTERS], pc: u32) {
    println!("Final Registers (including special purpose):");
    println!("PC: {:10} (0x{:08X})", pc, pc);
    for (i, val) in regs.iter().enumerate() {
        print!("R{:02}: {}", i, format_value(*val));
        if (i + 1) % 4 == 0 {
            println!();
        } else {
            print!("  |  ");
        }
    }
}

/// Print the full unified memory: instruction words with their mnemonic,
/// then data words in decimal and hex. Zero rows are dimmed.
pub fn mem_dump(mem: &[u32; MEM_SIZE]) {
    println!();
    println!("Final Instruction Memory (0 to {}):", INSTR_MEM_END);
    for (i, word) in mem.iter().enumerate().take(DATA_MEM_START as usize) {
        let row = format!("Mem[{:04}]: 0x{:08X} ({})", i, word, op_code::name_of((word >> 28) as u8));
        if *word == 0 {
            println!("{}", gray().paint(row));
        } else {
            println!("{}", row);
        }
    }
    println!();
    println!("Final Data Memory ({} to {}):", DATA_MEM_START, MEM_SIZE - 1);
    for (i, word) in mem.iter().enumerate().skip(DATA_MEM_START as usize) {
        let row = format!("Mem[{:04}]: {:10} (0x{:08X})", i, *word as i32, word);
        if *word == 0 {
            println!("{}", gray().paint(row));
        } else {
            println!("{}", row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_literal;

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal("42"), Some(42));
        assert_eq!(parse_literal("-3"), Some(-3));
        assert_eq!(parse_literal("0x10"), Some(16));
        assert_eq!(parse_literal("-0x10"), Some(-16));
        assert_eq!(parse_literal("R1"), None);
        assert_eq!(parse_literal(""), None);
    }
}
