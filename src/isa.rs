//! Instruction Set definition for the MIPS-like teaching architecture

macro_rules! define_code {
    {
        @mod $modname:ident;
        @type $typ:ty;
        $( $cname:ident = $cval:expr; )*
    } => {
        pub mod $modname {
            $(pub const $cname : $typ = $cval; )*
            pub fn name_of(code: $typ) -> &'static str {
                match code {
                    $($cname => stringify!($cname), )*
                    _ => "UNK"
                }
            }
        }
    };
}

define_code! {
    @mod op_code;
    @type u8;
    ADD = 0;
    SUB = 1;
    MULI = 2;
    ADDI = 3;
    BNE = 4;
    ANDI = 5;
    ORI = 6;
    J = 7;
    SLL = 8;
    SRL = 9;
    LW = 10;
    SW = 11;
    NOP = 15;
}

/// Raw word of an encoded NOP (opcode in the top nibble, rest zero).
pub const NOP_WORD: u32 = (op_code::NOP as u32) << 28;

/// Decoded instruction.
///
/// Register fields are 5 bits, the shift amount 13 bits, the immediate
/// 18 bits sign-extended, the jump address 28 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
    R { op: u8, r1: u8, r2: u8, r3: u8, shamt: u32 },
    I { op: u8, r1: u8, r2: u8, imm: i32 },
    J { addr: u32 },
    Nop,
}

/// Sign-extend the low 18 bits of a word.
pub fn sign_extend18(word: u32) -> i32 {
    ((word & 0x3FFFF) << 14) as i32 >> 14
}

impl Inst {
    pub fn opcode(&self) -> u8 {
        match *self {
            Inst::R { op, .. } | Inst::I { op, .. } => op,
            Inst::J { .. } => op_code::J,
            Inst::Nop => op_code::NOP,
        }
    }

    pub fn name(&self) -> &'static str {
        op_code::name_of(self.opcode())
    }

    /// Bit layout: opcode in 31..28, r1/r2/r3 in 27..23/22..18/17..13 with
    /// the shift amount in 12..0 (R-type), immediate in 17..0 (I-type),
    /// jump address in 27..0 (J-type).
    pub fn encode(&self) -> u32 {
        match *self {
            Inst::R { op, r1, r2, r3, shamt } => {
                (op as u32) << 28
                    | (r1 as u32) << 23
                    | (r2 as u32) << 18
                    | (r3 as u32) << 13
                    | (shamt & 0x1FFF)
            }
            Inst::I { op, r1, r2, imm } => {
                (op as u32) << 28 | (r1 as u32) << 23 | (r2 as u32) << 18 | (imm as u32 & 0x3FFFF)
            }
            Inst::J { addr } => (op_code::J as u32) << 28 | (addr & 0x0FFF_FFFF),
            Inst::Nop => NOP_WORD,
        }
    }

    /// Decode a word; `None` for an opcode outside the table.
    pub fn decode(word: u32) -> Option<Self> {
        use op_code::*;
        let op = (word >> 28) as u8;
        match op {
            ADD | SUB | SLL | SRL => {
                let r1 = ((word >> 23) & 0x1F) as u8;
                let r2 = ((word >> 18) & 0x1F) as u8;
                let (r3, shamt) = if op == SLL || op == SRL {
                    (0, word & 0x1FFF)
                } else {
                    (((word >> 13) & 0x1F) as u8, 0)
                };
                Some(Inst::R { op, r1, r2, r3, shamt })
            }
            MULI | ADDI | BNE | ANDI | ORI | LW | SW => Some(Inst::I {
                op,
                r1: ((word >> 23) & 0x1F) as u8,
                r2: ((word >> 18) & 0x1F) as u8,
                imm: sign_extend18(word),
            }),
            J => Some(Inst::J { addr: word & 0x0FFF_FFFF }),
            NOP => Some(Inst::Nop),
            _ => None,
        }
    }

    /// Destination register, for the opcodes that write one back
    /// (ALU producers and LW). BNE, J, SW and NOP write nothing, which is
    /// also what excludes them as forwarding sources.
    pub fn dest(&self) -> Option<u8> {
        match *self {
            Inst::R { r1, .. } => Some(r1),
            Inst::I { op, r1, .. } if op != op_code::BNE && op != op_code::SW => Some(r1),
            _ => None,
        }
    }

    /// Register indices this instruction reads in ID, by field slot:
    /// `[r1-as-source, r2, r3]`. R1 is a source only for BNE and SW;
    /// R3 only for R-type instructions that are not shifts.
    pub fn src_regs(&self) -> [Option<u8>; 3] {
        match *self {
            Inst::R { op, r2, r3, .. } => {
                if op == op_code::SLL || op == op_code::SRL {
                    [None, Some(r2), None]
                } else {
                    [None, Some(r2), Some(r3)]
                }
            }
            Inst::I { op, r1, r2, .. } => {
                let r1_src = (op == op_code::BNE || op == op_code::SW).then_some(r1);
                [r1_src, Some(r2), None]
            }
            Inst::J { .. } | Inst::Nop => [None, None, None],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{op_code, sign_extend18, Inst};

    #[test]
    fn test_round_trip() {
        let insts = [
            Inst::R { op: op_code::ADD, r1: 3, r2: 1, r3: 2, shamt: 0 },
            Inst::R { op: op_code::SUB, r1: 31, r2: 30, r3: 29, shamt: 0 },
            Inst::R { op: op_code::SLL, r1: 4, r2: 5, r3: 0, shamt: 0x1FFF },
            Inst::R { op: op_code::SRL, r1: 4, r2: 5, r3: 0, shamt: 1 },
            Inst::I { op: op_code::ADDI, r1: 1, r2: 0, imm: 5 },
            Inst::I { op: op_code::MULI, r1: 7, r2: 8, imm: -42 },
            Inst::I { op: op_code::BNE, r1: 1, r2: 2, imm: -3 },
            Inst::I { op: op_code::LW, r1: 2, r2: 5, imm: 1024 },
            Inst::I { op: op_code::SW, r1: 2, r2: 5, imm: -131072 },
            Inst::J { addr: 0x0FFF_FFFF },
            Inst::Nop,
        ];
        for inst in insts {
            assert_eq!(Inst::decode(inst.encode()), Some(inst), "{inst:?}");
        }
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend18(0x3FFFF), -1);
        assert_eq!(sign_extend18(0x20000), -131072);
        assert_eq!(sign_extend18(0x1FFFF), 131071);
        assert_eq!(sign_extend18(0), 0);
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(Inst::decode(12 << 28), None);
        assert_eq!(Inst::decode(13 << 28), None);
        assert_eq!(Inst::decode(14 << 28), None);
    }

    #[test]
    fn test_register_roles() {
        let bne = Inst::I { op: op_code::BNE, r1: 1, r2: 2, imm: 0 };
        assert_eq!(bne.dest(), None);
        assert_eq!(bne.src_regs(), [Some(1), Some(2), None]);

        let lw = Inst::I { op: op_code::LW, r1: 2, r2: 5, imm: 0 };
        assert_eq!(lw.dest(), Some(2));
        assert_eq!(lw.src_regs(), [None, Some(5), None]);

        let sll = Inst::R { op: op_code::SLL, r1: 4, r2: 5, r3: 0, shamt: 2 };
        assert_eq!(sll.src_regs(), [None, Some(5), None]);
    }
}
