//! Static definition of the OKTO-8 instruction set: opcode nibbles,
//! addressing-mode layouts, jump condition codes and the mnemonic maps.
//! Pure constant data, never mutated after startup.

use std::fmt;

/// The three general-purpose registers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Register {
    A = 0,
    B = 1,
    /// Doubles as the index register for indirect addressing.
    I = 2,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::A => f.write_str("A"),
            Register::B => f.write_str("B"),
            Register::I => f.write_str("I"),
        }
    }
}

/// Fully resolved operand location, as produced by the assembler and
/// consumed by the runtime.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Reg(Register),
    /// Memory cell addressed by register I.
    IndirectI,
    /// Inline literal carried in the trailing byte. Read-only.
    Const(u8),
    /// Memory cell at a fixed address carried in the trailing byte.
    Direct(u8),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::IndirectI => f.write_str("[I]"),
            Operand::Const(val) => write!(f, "{val:02X}H"),
            Operand::Direct(addr) => write!(f, "[{addr:02X}H]"),
        }
    }
}

/// Operand slot of an addressing-mode table row. The `Extra` slots match
/// any operand of their kind and carry its value in a trailing instruction
/// byte; at most one slot per row may be an `Extra` slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Slot {
    Reg(Register),
    IndirectI,
    ConstExtra,
    DirectExtra,
}

impl Slot {
    /// Whether this slot's value is supplied by a trailing byte.
    pub fn has_extra(self) -> bool {
        matches!(self, Slot::ConstExtra | Slot::DirectExtra)
    }

    /// Check an operand against this slot. Register slots match by name,
    /// extra slots match any operand of the same kind.
    pub fn matches(self, operand: Operand) -> bool {
        match (self, operand) {
            (Slot::Reg(slot), Operand::Reg(reg)) => slot == reg,
            (Slot::IndirectI, Operand::IndirectI) => true,
            (Slot::ConstExtra, Operand::Const(_)) => true,
            (Slot::DirectExtra, Operand::Direct(_)) => true,
            _ => false,
        }
    }

    /// Turn a table slot into a concrete operand, filling in the trailing
    /// byte where the slot requires one.
    pub fn resolve(self, extra: u8) -> Operand {
        match self {
            Slot::Reg(reg) => Operand::Reg(reg),
            Slot::IndirectI => Operand::IndirectI,
            Slot::ConstExtra => Operand::Const(extra),
            Slot::DirectExtra => Operand::Direct(extra),
        }
    }
}

/// Binary addressing modes as (destination, source), indexed by the low
/// nibble of the opcode byte.
pub const BINARY_MODES: [(Slot, Slot); 14] = [
    (Slot::Reg(Register::A), Slot::Reg(Register::B)), // 0x0
    (Slot::Reg(Register::B), Slot::Reg(Register::A)), // 0x1
    (Slot::Reg(Register::A), Slot::Reg(Register::I)), // 0x2
    (Slot::Reg(Register::I), Slot::Reg(Register::A)), // 0x3
    (Slot::Reg(Register::A), Slot::IndirectI),        // 0x4
    (Slot::IndirectI, Slot::Reg(Register::A)),        // 0x5
    (Slot::Reg(Register::A), Slot::ConstExtra),       // 0x6
    (Slot::Reg(Register::B), Slot::ConstExtra),       // 0x7
    (Slot::Reg(Register::I), Slot::ConstExtra),       // 0x8
    (Slot::IndirectI, Slot::ConstExtra),              // 0x9
    (Slot::Reg(Register::A), Slot::DirectExtra),      // 0xA
    (Slot::Reg(Register::B), Slot::DirectExtra),      // 0xB
    (Slot::DirectExtra, Slot::Reg(Register::A)),      // 0xC
    (Slot::DirectExtra, Slot::Reg(Register::B)),      // 0xD
];

/// Unary addressing modes as (mode code, destination) pairs. Mode 0x3 is
/// unassigned.
pub const UNARY_MODES: [(u8, Slot); 4] = [
    (0x0, Slot::Reg(Register::A)),
    (0x1, Slot::Reg(Register::B)),
    (0x2, Slot::Reg(Register::I)),
    (0x4, Slot::IndirectI),
];

/// Operations taking a destination and a source. Discriminants are the
/// high nibble of the encoded opcode byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp {
    Add = 0x0,
    Sub = 0x1,
    Cmp = 0x2,
    And = 0x5,
    Or = 0x6,
    Mov = 0xB,
}

/// Operations taking a single destination and no source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnOp {
    Inc = 0x3,
    Dec = 0x4,
    Not = 0x7,
    Shr = 0x8,
    Shl = 0x9,
}

/// Any ALU operation. Jumps and nop are encoded outside the nibble scheme
/// and handled separately.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Binary(BinOp),
    Unary(UnOp),
}

impl Op {
    /// Operation for the high nibble of an opcode byte. 0xA is reserved
    /// for jumps and 0xF for nop; the rest are unassigned.
    pub fn from_nibble(nibble: u8) -> Option<Op> {
        Some(match nibble {
            0x0 => Op::Binary(BinOp::Add),
            0x1 => Op::Binary(BinOp::Sub),
            0x2 => Op::Binary(BinOp::Cmp),
            0x3 => Op::Unary(UnOp::Inc),
            0x4 => Op::Unary(UnOp::Dec),
            0x5 => Op::Binary(BinOp::And),
            0x6 => Op::Binary(BinOp::Or),
            0x7 => Op::Unary(UnOp::Not),
            0x8 => Op::Unary(UnOp::Shr),
            0x9 => Op::Unary(UnOp::Shl),
            0xB => Op::Binary(BinOp::Mov),
            _ => return None,
        })
    }

    /// High nibble of the encoded opcode byte.
    pub fn nibble(self) -> u8 {
        match self {
            Op::Binary(op) => op as u8,
            Op::Unary(op) => op as u8,
        }
    }

    /// Mnemonic lookup. Expects lower case.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Op> {
        Some(match mnemonic {
            "add" => Op::Binary(BinOp::Add),
            "sub" => Op::Binary(BinOp::Sub),
            "cmp" => Op::Binary(BinOp::Cmp),
            "and" => Op::Binary(BinOp::And),
            "or" => Op::Binary(BinOp::Or),
            "mov" => Op::Binary(BinOp::Mov),
            "inc" => Op::Unary(UnOp::Inc),
            "dec" => Op::Unary(UnOp::Dec),
            "not" => Op::Unary(UnOp::Not),
            "shr" => Op::Unary(UnOp::Shr),
            "shl" => Op::Unary(UnOp::Shl),
            _ => return None,
        })
    }
}

/// Jump conditions in condition-code order; the encoded opcode is
/// `JUMP_BASE` plus the condition code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JumpCond {
    Always = 0,
    Zero = 1,
    Sign = 2,
    Carry = 3,
    Overflow = 4,
    Parity = 5,
}

impl JumpCond {
    /// Mnemonic lookup. Expects lower case.
    pub fn from_mnemonic(mnemonic: &str) -> Option<JumpCond> {
        Some(match mnemonic {
            "jmp" => JumpCond::Always,
            "jz" => JumpCond::Zero,
            "js" => JumpCond::Sign,
            "jc" => JumpCond::Carry,
            "jo" => JumpCond::Overflow,
            "jp" => JumpCond::Parity,
            _ => return None,
        })
    }

    /// Condition for a byte in the reserved jump opcode range.
    pub fn from_opcode(byte: u8) -> Option<JumpCond> {
        Some(match byte {
            0xA0 => JumpCond::Always,
            0xA1 => JumpCond::Zero,
            0xA2 => JumpCond::Sign,
            0xA3 => JumpCond::Carry,
            0xA4 => JumpCond::Overflow,
            0xA5 => JumpCond::Parity,
            _ => return None,
        })
    }

    pub fn opcode(self) -> u8 {
        JUMP_BASE + self as u8
    }
}

/// First byte of the reserved jump opcode range.
pub const JUMP_BASE: u8 = 0xA0;

/// The one-byte no-operand instruction. Advances the program counter and
/// changes nothing else.
pub const NOP: u8 = 0xFF;

/// Size of the flat address space shared by code and data.
pub const MEMORY_SIZE: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_nibbles_round_trip() {
        for nibble in 0x0..=0xF {
            if let Some(op) = Op::from_nibble(nibble) {
                assert_eq!(op.nibble(), nibble);
            }
        }
        // Reserved nibbles decode to no ALU op
        assert_eq!(Op::from_nibble(0xA), None);
        assert_eq!(Op::from_nibble(0xC), None);
        assert_eq!(Op::from_nibble(0xF), None);
    }

    #[test]
    fn jump_opcodes_round_trip() {
        for byte in 0xA0..=0xA5 {
            let cond = JumpCond::from_opcode(byte).unwrap();
            assert_eq!(cond.opcode(), byte);
        }
        assert_eq!(JumpCond::from_opcode(0xA6), None);
        assert_eq!(JumpCond::from_opcode(0x9F), None);
    }

    #[test]
    fn mnemonic_sets_are_disjoint() {
        for mnemonic in ["add", "sub", "cmp", "and", "or", "mov"] {
            assert!(matches!(Op::from_mnemonic(mnemonic), Some(Op::Binary(_))));
        }
        for mnemonic in ["inc", "dec", "not", "shr", "shl"] {
            assert!(matches!(Op::from_mnemonic(mnemonic), Some(Op::Unary(_))));
        }
        assert_eq!(Op::from_mnemonic("jmp"), None);
        assert_eq!(Op::from_mnemonic("nop"), None);
    }

    #[test]
    fn binary_modes_have_at_most_one_extra() {
        for (dst, src) in BINARY_MODES {
            assert!(!(dst.has_extra() && src.has_extra()));
        }
    }

    #[test]
    fn unary_modes_carry_no_extra() {
        for (_, slot) in UNARY_MODES {
            assert!(!slot.has_extra());
        }
    }

    #[test]
    fn slot_matching() {
        assert!(Slot::Reg(Register::A).matches(Operand::Reg(Register::A)));
        assert!(!Slot::Reg(Register::A).matches(Operand::Reg(Register::B)));
        assert!(Slot::ConstExtra.matches(Operand::Const(0x12)));
        assert!(Slot::DirectExtra.matches(Operand::Direct(0x12)));
        assert!(!Slot::ConstExtra.matches(Operand::Direct(0x12)));
        assert!(Slot::IndirectI.matches(Operand::IndirectI));
        assert!(!Slot::IndirectI.matches(Operand::Const(0)));
    }
}
