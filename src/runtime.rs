//! Fetch-decode-execute engine for the OKTO-8: three 8-bit registers, a
//! five-bit flags register, a flat 256-byte memory and a program counter.
//!
//! Execution halts positionally when the program counter reaches the end
//! of assembled code; there is no halt instruction. The instruction set
//! permits infinite loops by design, so callers wanting a bound on `run`
//! must impose one externally.

use miette::{bail, Result};

use crate::assembler::{Assembly, LabelTable};
use crate::isa::{BinOp, JumpCond, Op, Operand, Register, UnOp, BINARY_MODES, NOP, UNARY_MODES};
use crate::MEMORY_SIZE;

/// Flag bits of the FLAGS register, by bit position. Bits 0-2 are
/// reserved and always zero.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flag {
    /// Overflow (signed).
    OF = 7,
    /// Carry / borrow (unsigned).
    CF = 6,
    /// Zero.
    ZF = 5,
    /// Even parity of the result.
    PF = 4,
    /// Sign, bit 7 of the result.
    SF = 3,
}

/// Complete machine state during a run. Owns an independent copy of the
/// assembled image, so repeated runs never alias stale state.
pub struct RunState {
    /// Flat address space shared by code and data.
    mem: Box<[u8; MEMORY_SIZE]>,
    /// General registers, indexed by `Register`.
    reg: [u8; 3],
    flags: u8,
    pc: u16,
    /// First address past assembled code; reaching it halts execution.
    program_end: u16,
    /// Kept for drivers that map addresses back to names.
    labels: LabelTable,
}

impl RunState {
    pub fn new(assembly: &Assembly) -> RunState {
        RunState {
            mem: Box::new(assembly.image),
            reg: [0; 3],
            flags: 0,
            pc: 0,
            program_end: assembly.code_end,
            labels: assembly.labels.clone(),
        }
    }

    pub fn reg(&self, reg: Register) -> u8 {
        self.reg[reg as usize]
    }

    fn set_reg(&mut self, reg: Register, val: u8) {
        self.reg[reg as usize] = val;
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn program_end(&self) -> u16 {
        self.program_end
    }

    /// Whether the program counter has fallen off the assembled code.
    pub fn halted(&self) -> bool {
        self.pc >= self.program_end
    }

    pub fn mem(&self, addr: u8) -> u8 {
        self.mem[addr as usize]
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn flag(&self, flag: Flag) -> bool {
        (self.flags >> flag as u8) & 1 != 0
    }

    fn set_flag(&mut self, flag: Flag, val: bool) {
        let mask = 1 << flag as u8;
        if val {
            self.flags |= mask;
        } else {
            self.flags &= !mask;
        }
    }

    /// Shared post-op hook: ZF, SF and PF always follow the result, while
    /// CF and OF are caller-supplied. Logical operations force both to 0.
    fn set_flags(&mut self, res: u8, cf: bool, of: bool, logical: bool) {
        self.set_flag(Flag::ZF, res == 0);
        self.set_flag(Flag::SF, res & 0x80 != 0);
        self.set_flag(Flag::PF, res.count_ones() % 2 == 0);
        self.set_flag(Flag::CF, cf && !logical);
        self.set_flag(Flag::OF, of && !logical);
    }

    fn read(&self, loc: Operand) -> u8 {
        match loc {
            Operand::Reg(reg) => self.reg(reg),
            Operand::IndirectI => self.mem[self.reg(Register::I) as usize],
            Operand::Const(val) => val,
            Operand::Direct(addr) => self.mem[addr as usize],
        }
    }

    /// Constants are read-only; a write to one means the decoder produced
    /// a nonsense destination, which is a fatal internal error.
    fn write(&mut self, loc: Operand, val: u8) -> Result<()> {
        match loc {
            Operand::Reg(reg) => self.set_reg(reg, val),
            Operand::IndirectI => {
                let addr = self.reg(Register::I);
                self.mem[addr as usize] = val;
            }
            Operand::Direct(addr) => self.mem[addr as usize] = val,
            Operand::Const(val) => bail!("attempted write to constant operand {val:02X}H"),
        }
        Ok(())
    }

    /// Execute until the program counter falls off the assembled code.
    pub fn run(&mut self) -> Result<()> {
        while !self.halted() {
            self.step()?;
        }
        Ok(())
    }

    /// Execute exactly one instruction or branch. Calling this after the
    /// machine has halted is a caller error.
    pub fn step(&mut self) -> Result<()> {
        if self.halted() {
            bail!(
                "program counter {:02X}H is past the end of code at {:02X}H",
                self.pc,
                self.program_end,
            );
        }
        let instr = self.fetch()?;
        if instr == NOP {
            return Ok(());
        }
        if let Some(cond) = JumpCond::from_opcode(instr) {
            let target = self.fetch()?;
            if self.take_jump(cond) {
                self.pc = target as u16;
            }
            return Ok(());
        }

        let mode = instr & 0x0F;
        let Some(op) = Op::from_nibble(instr >> 4) else {
            bail!(
                "invalid opcode {:02X}H at {:02X}H",
                instr,
                self.pc.wrapping_sub(1),
            );
        };
        match op {
            Op::Unary(op) => {
                let slot = UNARY_MODES
                    .iter()
                    .find(|&&(code, _)| code == mode)
                    .map(|&(_, slot)| slot);
                let Some(slot) = slot else {
                    bail!(
                        "invalid unary addressing mode {:X}H at {:02X}H",
                        mode,
                        self.pc.wrapping_sub(1),
                    );
                };
                self.unary(op, slot.resolve(0))
            }
            Op::Binary(op) => {
                let Some(&(dst, src)) = BINARY_MODES.get(mode as usize) else {
                    bail!(
                        "invalid addressing mode {:X}H at {:02X}H",
                        mode,
                        self.pc.wrapping_sub(1),
                    );
                };
                let extra = if dst.has_extra() || src.has_extra() {
                    self.fetch()?
                } else {
                    0
                };
                self.binary(op, dst.resolve(extra), src.resolve(extra))
            }
        }
    }

    /// Read the byte at PC and advance by one.
    fn fetch(&mut self) -> Result<u8> {
        let Some(&byte) = self.mem.get(self.pc as usize) else {
            bail!(
                "instruction at {:02X}H runs past the end of memory",
                self.pc.wrapping_sub(1),
            );
        };
        self.pc += 1;
        Ok(byte)
    }

    fn take_jump(&self, cond: JumpCond) -> bool {
        match cond {
            JumpCond::Always => true,
            JumpCond::Zero => self.flag(Flag::ZF),
            JumpCond::Sign => self.flag(Flag::SF),
            JumpCond::Carry => self.flag(Flag::CF),
            JumpCond::Overflow => self.flag(Flag::OF),
            JumpCond::Parity => self.flag(Flag::PF),
        }
    }

    fn binary(&mut self, op: BinOp, dst: Operand, src: Operand) -> Result<()> {
        match op {
            BinOp::Add => self.add(dst, src),
            BinOp::Sub => {
                let res = self.compare(dst, src);
                self.write(dst, res)
            }
            // cmp is a sub that discards the result
            BinOp::Cmp => {
                self.compare(dst, src);
                Ok(())
            }
            BinOp::And => self.and(dst, src),
            BinOp::Or => self.or(dst, src),
            BinOp::Mov => {
                let val = self.read(src);
                self.write(dst, val)
            }
        }
    }

    fn unary(&mut self, op: UnOp, dst: Operand) -> Result<()> {
        match op {
            UnOp::Inc => self.inc(dst),
            UnOp::Dec => self.dec(dst),
            UnOp::Not => self.not(dst),
            UnOp::Shr => self.shr(dst),
            UnOp::Shl => self.shl(dst),
        }
    }

    fn add(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = self.read(dst);
        let s = self.read(src);
        let (res, cf) = d.overflowing_add(s);
        let of = (d as i8).overflowing_add(s as i8).1;
        self.set_flags(res, cf, of, false);
        self.write(dst, res)
    }

    /// Flag-setting subtraction shared by sub and cmp. CF is the unsigned
    /// borrow, OF the signed overflow.
    fn compare(&mut self, dst: Operand, src: Operand) -> u8 {
        let d = self.read(dst);
        let s = self.read(src);
        let (res, cf) = d.overflowing_sub(s);
        let of = (d as i8).overflowing_sub(s as i8).1;
        self.set_flags(res, cf, of, false);
        res
    }

    fn and(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let res = self.read(dst) & self.read(src);
        self.set_flags(res, false, false, true);
        self.write(dst, res)
    }

    fn or(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let res = self.read(dst) | self.read(src);
        self.set_flags(res, false, false, true);
        self.write(dst, res)
    }

    fn inc(&mut self, dst: Operand) -> Result<()> {
        let val = self.read(dst);
        let res = val.wrapping_add(1);
        // CF is carried over unchanged, not recomputed
        let cf = self.flag(Flag::CF);
        let of = (val as i8).overflowing_add(1).1;
        self.set_flags(res, cf, of, false);
        self.write(dst, res)
    }

    fn dec(&mut self, dst: Operand) -> Result<()> {
        let val = self.read(dst);
        let res = val.wrapping_sub(1);
        // CF is carried over unchanged, not recomputed
        let cf = self.flag(Flag::CF);
        let of = (val as i8).overflowing_sub(1).1;
        self.set_flags(res, cf, of, false);
        self.write(dst, res)
    }

    /// Bitwise complement. Touches no flags.
    fn not(&mut self, dst: Operand) -> Result<()> {
        let res = !self.read(dst);
        self.write(dst, res)
    }

    fn shr(&mut self, dst: Operand) -> Result<()> {
        let val = self.read(dst);
        let res = val >> 1;
        let cf = val & 0x01 != 0;
        // OF takes the pre-shift sign bit
        let of = val & 0x80 != 0;
        self.set_flags(res, cf, of, false);
        self.write(dst, res)
    }

    fn shl(&mut self, dst: Operand) -> Result<()> {
        let val = self.read(dst);
        let res = val << 1;
        let cf = val & 0x80 != 0;
        // OF signals a sign change: carry-out XOR the new sign bit
        let of = cf ^ (res & 0x80 != 0);
        self.set_flags(res, cf, of, false);
        self.write(dst, res)
    }
}
