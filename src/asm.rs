//! This module provides parsing utilities for the MIPS-like assembly.
use anyhow::{bail, Context, Result};

use pest::Parser;
use pest_derive::Parser;

use crate::isa::{op_code, Inst};
use crate::object::{Object, SourceInfo};
use crate::pipeline::hardware::INSTR_MEM_END;
use crate::utils::parse_literal;

#[derive(Parser)]
#[grammar = "src/grammar.pest"] // relative to crate root
pub struct MipsAsmParser;

pub fn parse(src: &str) -> Result<pest::iterators::Pairs<'_, Rule>> {
    Ok(MipsAsmParser::parse(Rule::main, src)
        .context("fail to parse assembly source")?
        .next()
        .unwrap()
        .into_inner())
}

#[derive(Default)]
pub struct AssembleOption {
    verbose: bool,
}

impl AssembleOption {
    pub fn set_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// transform assembly code to encoded instruction words
pub fn assemble(src: &str, option: AssembleOption) -> Result<Object> {
    macro_rules! verbo {
        ($e:expr) => {
            if option.verbose {
                dbg!($e);
            }
        };
    }
    let mut obj = Object::default();
    let lines = parse(src).context("fail to assemble source")?;

    for line in lines.filter(|l| l.as_rule() == Rule::line) {
        let src = line.as_str().to_string();
        let pair = line.into_inner().next().unwrap();
        verbo!(&pair);
        let inst = lower(pair, &src)?;
        let addr = obj.words.len() as u32;
        if addr > INSTR_MEM_END {
            bail!("program does not fit in instruction memory: `{}`", src);
        }
        obj.words.push(inst.encode());
        obj.source.push(SourceInfo { addr, inst, src });
    }
    Ok(obj)
}

/// Build one instruction from a parsed line. The mnemonic is recovered from
/// the line prefix; operand pairs follow in grammar order.
fn lower(pair: pest::iterators::Pair<'_, Rule>, src: &str) -> Result<Inst> {
    let rule = pair.as_rule();
    let mut it = pair.into_inner();
    match rule {
        Rule::i_rtype => {
            let op = if src.starts_with("SUB") { op_code::SUB } else { op_code::ADD };
            let r1 = parse_register(it.next().unwrap().as_str())?;
            let r2 = parse_register(it.next().unwrap().as_str())?;
            let r3 = parse_register(it.next().unwrap().as_str())?;
            Ok(Inst::R { op, r1, r2, r3, shamt: 0 })
        }
        Rule::i_shift => {
            let op = if src.starts_with("SRL") { op_code::SRL } else { op_code::SLL };
            let r1 = parse_register(it.next().unwrap().as_str())?;
            let r2 = parse_register(it.next().unwrap().as_str())?;
            let shamt = parse_immediate(it.next().unwrap().as_str())?;
            if !(0..=0x1FFF).contains(&shamt) {
                bail!("shift amount too large: `{}`", src);
            }
            Ok(Inst::R { op, r1, r2, r3: 0, shamt: shamt as u32 })
        }
        Rule::i_itype => {
            let op = if src.starts_with("MULI") {
                op_code::MULI
            } else if src.starts_with("ADDI") {
                op_code::ADDI
            } else if src.starts_with("BNE") {
                op_code::BNE
            } else if src.starts_with("ANDI") {
                op_code::ANDI
            } else {
                op_code::ORI
            };
            let r1 = parse_register(it.next().unwrap().as_str())?;
            let r2 = parse_register(it.next().unwrap().as_str())?;
            let imm = parse_immediate(it.next().unwrap().as_str())?;
            Ok(Inst::I { op, r1, r2, imm })
        }
        Rule::i_mem => {
            let op = if src.starts_with("SW") { op_code::SW } else { op_code::LW };
            let r1 = parse_register(it.next().unwrap().as_str())?;
            let mut addr = it.next().unwrap().into_inner();
            let imm = parse_immediate(addr.next().unwrap().as_str())?;
            let r2 = parse_register(addr.next().unwrap().as_str())?;
            Ok(Inst::I { op, r1, r2, imm })
        }
        Rule::i_jump => {
            let addr = parse_immediate(it.next().unwrap().as_str())?;
            Ok(Inst::J { addr: addr as u32 & 0x0FFF_FFFF })
        }
        Rule::i_nop => Ok(Inst::Nop),
        _ => unreachable!(),
    }
}

fn parse_register(s: &str) -> Result<u8> {
    let num: u32 = s[1..].parse().with_context(|| format!("invalid register `{s}`"))?;
    if num >= 32 {
        bail!("invalid register `{s}`");
    }
    Ok(num as u8)
}

fn parse_immediate(s: &str) -> Result<i32> {
    match parse_literal(s) {
        Some(n) if i32::try_from(n).is_ok() => Ok(n as i32),
        _ => bail!("invalid immediate `{s}`"),
    }
}

#[cfg(test)]
pub mod tests {
    use pest::Parser;

    use super::{assemble, AssembleOption, MipsAsmParser, Rule};
    use crate::isa::{op_code, Inst};

    pub const SUM_DEMO: &str = r#"
ADDI R1 R0 1024
ADDI R2 R0 7
ADDI R3 R0 35
SW R2 0(R1)
SW R3 1(R1)
LW R4 0(R1)
LW R5 1(R1)
ADD R6 R4 R5
SLL R7 R6 1
SRL R8 R6 0x1
ANDI R9 R6 12
ORI R10 R6 3
MULI R11 R6 -2
SUB R12 R11 R6
BNE R12 R6 1
J 16
NOP
"#;

    #[test]
    fn test_parser() {
        let lines = MipsAsmParser::parse(Rule::main, SUM_DEMO)
            .unwrap()
            .next()
            .unwrap()
            .into_inner();
        // iterate all lines
        for line in lines.filter(|l| l.as_rule() == Rule::line) {
            dbg!(line);
        }
    }

    #[test]
    fn test_assemble() -> anyhow::Result<()> {
        let obj = assemble(SUM_DEMO, AssembleOption::default())?;
        assert_eq!(obj.words.len(), 17);
        assert_eq!(obj.source[0].inst, Inst::I { op: op_code::ADDI, r1: 1, r2: 0, imm: 1024 });
        assert_eq!(obj.source[3].inst, Inst::I { op: op_code::SW, r1: 2, r2: 1, imm: 0 });
        assert_eq!(obj.source[9].inst, Inst::R { op: op_code::SRL, r1: 8, r2: 6, r3: 0, shamt: 1 });
        assert_eq!(obj.source[15].inst, Inst::J { addr: 16 });
        assert_eq!(obj.source[16].inst, Inst::Nop);
        assert_eq!(obj.words[0], obj.source[0].inst.encode());
        Ok(())
    }

    #[test]
    fn test_reject() {
        assert!(assemble("FOO R1 R2 R3", AssembleOption::default()).is_err());
        assert!(assemble("ADD R1 R2", AssembleOption::default()).is_err());
        assert!(assemble("ADDI R32 R0 1", AssembleOption::default()).is_err());
        assert!(assemble("SLL R1 R2 9000", AssembleOption::default()).is_err());
        assert!(assemble("LW R1 5R2", AssembleOption::default()).is_err());
    }
}
