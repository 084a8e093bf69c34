//! Instruction table and handlers
//!
//! Every supported opcode byte maps to one immutable [`InstructionInfo`]
//! descriptor. Descriptors carry the handler that executes the instruction,
//! so the CPU dispatches with a single table lookup per fetch. The table is
//! built once per process and shared by every [`Cpu`](crate::cpu::Cpu).

use std::fmt;
use std::sync::OnceLock;

use crate::bits::{set_bit, test_bit};
use crate::cpu::{Bus, CpuError, Registers, StatusFlags, IRQ_VECTOR};

/// Addressing modes used by the supported instruction set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// No operand, or the accumulator for shifts and rotates
    Implied,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// Signed 8-bit branch offset
    Relative,
}

/// Instruction mnemonics
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC, BVS, CLC,
    CLD, CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR, INC, INX, INY, JMP,
    JSR, LDA, LDX, LDY, LSR, NOP, ORA, PHA, PHP, PLA, PLP, ROL, ROR, RTI,
    RTS, SBC, SEC, SED, SEI, STA, STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,
}

impl Opcode {
    /// Short human-readable description
    pub fn description(self) -> &'static str {
        match self {
            Opcode::ADC => "Add with carry",
            Opcode::AND => "Logical AND",
            Opcode::ASL => "Arithmetic shift left",
            Opcode::BCC => "Branch if carry clear",
            Opcode::BCS => "Branch if carry set",
            Opcode::BEQ => "Branch if equal",
            Opcode::BIT => "Bit test",
            Opcode::BMI => "Branch if minus",
            Opcode::BNE => "Branch if not equal",
            Opcode::BPL => "Branch if positive",
            Opcode::BRK => "Force interrupt",
            Opcode::BVC => "Branch if overflow clear",
            Opcode::BVS => "Branch if overflow set",
            Opcode::CLC => "Clear carry flag",
            Opcode::CLD => "Clear decimal mode",
            Opcode::CLI => "Clear interrupt disable",
            Opcode::CLV => "Clear overflow flag",
            Opcode::CMP => "Compare accumulator",
            Opcode::CPX => "Compare X register",
            Opcode::CPY => "Compare Y register",
            Opcode::DEC => "Decrement memory",
            Opcode::DEX => "Decrement X register",
            Opcode::DEY => "Decrement Y register",
            Opcode::EOR => "Exclusive OR",
            Opcode::INC => "Increment memory",
            Opcode::INX => "Increment X register",
            Opcode::INY => "Increment Y register",
            Opcode::JMP => "Jump",
            Opcode::JSR => "Jump to subroutine",
            Opcode::LDA => "Load accumulator",
            Opcode::LDX => "Load X register",
            Opcode::LDY => "Load Y register",
            Opcode::LSR => "Logical shift right",
            Opcode::NOP => "No operation",
            Opcode::ORA => "Logical inclusive OR",
            Opcode::PHA => "Push accumulator",
            Opcode::PHP => "Push processor status",
            Opcode::PLA => "Pull accumulator",
            Opcode::PLP => "Pull processor status",
            Opcode::ROL => "Rotate left",
            Opcode::ROR => "Rotate right",
            Opcode::RTI => "Return from interrupt",
            Opcode::RTS => "Return from subroutine",
            Opcode::SBC => "Subtract with carry",
            Opcode::SEC => "Set carry flag",
            Opcode::SED => "Set decimal flag",
            Opcode::SEI => "Set interrupt disable",
            Opcode::STA => "Store accumulator",
            Opcode::STX => "Store X register",
            Opcode::STY => "Store Y register",
            Opcode::TAX => "Transfer accumulator to X",
            Opcode::TAY => "Transfer accumulator to Y",
            Opcode::TSX => "Transfer stack pointer to X",
            Opcode::TXA => "Transfer X to accumulator",
            Opcode::TXS => "Transfer X to stack pointer",
            Opcode::TYA => "Transfer Y to accumulator",
        }
    }

    fn handler(self) -> Handler {
        match self {
            Opcode::ADC => adc,
            Opcode::AND => and,
            Opcode::ASL => asl,
            Opcode::BCC => bcc,
            Opcode::BCS => bcs,
            Opcode::BEQ => beq,
            Opcode::BIT => bit,
            Opcode::BMI => bmi,
            Opcode::BNE => bne,
            Opcode::BPL => bpl,
            Opcode::BRK => brk,
            Opcode::BVC => bvc,
            Opcode::BVS => bvs,
            Opcode::CLC => clc,
            Opcode::CLD => cld,
            Opcode::CLI => cli,
            Opcode::CLV => clv,
            Opcode::CMP => cmp,
            Opcode::CPX => cpx,
            Opcode::CPY => cpy,
            Opcode::DEC => dec,
            Opcode::DEX => dex,
            Opcode::DEY => dey,
            Opcode::EOR => eor,
            Opcode::INC => inc,
            Opcode::INX => inx,
            Opcode::INY => iny,
            Opcode::JMP => jmp,
            Opcode::JSR => jsr,
            Opcode::LDA => lda,
            Opcode::LDX => ldx,
            Opcode::LDY => ldy,
            Opcode::LSR => lsr,
            Opcode::NOP => nop,
            Opcode::ORA => ora,
            Opcode::PHA => pha,
            Opcode::PHP => php,
            Opcode::PLA => pla,
            Opcode::PLP => plp,
            Opcode::ROL => rol,
            Opcode::ROR => ror,
            Opcode::RTI => rti,
            Opcode::RTS => rts,
            Opcode::SBC => sbc,
            Opcode::SEC => sec,
            Opcode::SED => sed,
            Opcode::SEI => sei,
            Opcode::STA => sta,
            Opcode::STX => stx,
            Opcode::STY => sty,
            Opcode::TAX => tax,
            Opcode::TAY => tay,
            Opcode::TSX => tsx,
            Opcode::TXA => txa,
            Opcode::TXS => txs,
            Opcode::TYA => tya,
        }
    }
}

/// Executes one instruction after its opcode byte has been fetched
pub type Handler = fn(&mut Registers, &mut dyn Bus, AddressingMode) -> Result<(), CpuError>;

/// Immutable descriptor for one opcode byte
#[derive(Clone, Copy)]
pub struct InstructionInfo {
    pub code: u8,
    pub opcode: Opcode,
    pub mode: AddressingMode,
    /// Base cycle cost
    pub cycles: u8,
    pub description: &'static str,
    pub execute: Handler,
}

impl fmt::Debug for InstructionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionInfo")
            .field("code", &format_args!("{:#04X}", self.code))
            .field("opcode", &self.opcode)
            .field("mode", &self.mode)
            .field("cycles", &self.cycles)
            .finish()
    }
}

/// (code, mnemonic, mode, cycles)
const INSTRUCTIONS: &[(u8, Opcode, AddressingMode, u8)] = {
    use AddressingMode::*;
    use Opcode::*;
    &[
        // Loads
        (0xA9, LDA, Immediate, 2),
        (0xA5, LDA, ZeroPage, 3),
        (0xB5, LDA, ZeroPageX, 4),
        (0xAD, LDA, Absolute, 4),
        (0xBD, LDA, AbsoluteX, 4),
        (0xB9, LDA, AbsoluteY, 4),
        (0xA2, LDX, Immediate, 2),
        (0xA6, LDX, ZeroPage, 3),
        (0xB6, LDX, ZeroPageY, 4),
        (0xAE, LDX, Absolute, 4),
        (0xBE, LDX, AbsoluteY, 4),
        (0xA0, LDY, Immediate, 2),
        (0xA4, LDY, ZeroPage, 3),
        (0xB4, LDY, ZeroPageX, 4),
        (0xAC, LDY, Absolute, 4),
        (0xBC, LDY, AbsoluteX, 4),
        // Stores
        (0x85, STA, ZeroPage, 3),
        (0x95, STA, ZeroPageX, 4),
        (0x8D, STA, Absolute, 4),
        (0x9D, STA, AbsoluteX, 5),
        (0x99, STA, AbsoluteY, 5),
        (0x86, STX, ZeroPage, 3),
        (0x96, STX, ZeroPageY, 4),
        (0x8E, STX, Absolute, 4),
        (0x84, STY, ZeroPage, 3),
        (0x94, STY, ZeroPageX, 4),
        (0x8C, STY, Absolute, 4),
        // Arithmetic
        (0x69, ADC, Immediate, 2),
        (0x65, ADC, ZeroPage, 3),
        (0x75, ADC, ZeroPageX, 4),
        (0x6D, ADC, Absolute, 4),
        (0x7D, ADC, AbsoluteX, 4),
        (0x79, ADC, AbsoluteY, 4),
        (0xE9, SBC, Immediate, 2),
        (0xE5, SBC, ZeroPage, 3),
        (0xF5, SBC, ZeroPageX, 4),
        (0xED, SBC, Absolute, 4),
        (0xFD, SBC, AbsoluteX, 4),
        (0xF9, SBC, AbsoluteY, 4),
        // Logic
        (0x29, AND, Immediate, 2),
        (0x25, AND, ZeroPage, 3),
        (0x35, AND, ZeroPageX, 4),
        (0x2D, AND, Absolute, 4),
        (0x3D, AND, AbsoluteX, 4),
        (0x39, AND, AbsoluteY, 4),
        (0x09, ORA, Immediate, 2),
        (0x05, ORA, ZeroPage, 3),
        (0x15, ORA, ZeroPageX, 4),
        (0x0D, ORA, Absolute, 4),
        (0x1D, ORA, AbsoluteX, 4),
        (0x19, ORA, AbsoluteY, 4),
        (0x49, EOR, Immediate, 2),
        (0x45, EOR, ZeroPage, 3),
        (0x55, EOR, ZeroPageX, 4),
        (0x4D, EOR, Absolute, 4),
        (0x5D, EOR, AbsoluteX, 4),
        (0x59, EOR, AbsoluteY, 4),
        (0x24, BIT, ZeroPage, 3),
        (0x2C, BIT, Absolute, 4),
        // Compares
        (0xC9, CMP, Immediate, 2),
        (0xC5, CMP, ZeroPage, 3),
        (0xD5, CMP, ZeroPageX, 4),
        (0xCD, CMP, Absolute, 4),
        (0xDD, CMP, AbsoluteX, 4),
        (0xD9, CMP, AbsoluteY, 4),
        (0xE0, CPX, Immediate, 2),
        (0xE4, CPX, ZeroPage, 3),
        (0xEC, CPX, Absolute, 4),
        (0xC0, CPY, Immediate, 2),
        (0xC4, CPY, ZeroPage, 3),
        (0xCC, CPY, Absolute, 4),
        // Read-modify-write
        (0xE6, INC, ZeroPage, 5),
        (0xF6, INC, ZeroPageX, 6),
        (0xEE, INC, Absolute, 6),
        (0xFE, INC, AbsoluteX, 7),
        (0xC6, DEC, ZeroPage, 5),
        (0xD6, DEC, ZeroPageX, 6),
        (0xCE, DEC, Absolute, 6),
        (0xDE, DEC, AbsoluteX, 7),
        (0x0A, ASL, Implied, 2),
        (0x06, ASL, ZeroPage, 5),
        (0x16, ASL, ZeroPageX, 6),
        (0x0E, ASL, Absolute, 6),
        (0x1E, ASL, AbsoluteX, 7),
        (0x4A, LSR, Implied, 2),
        (0x46, LSR, ZeroPage, 5),
        (0x56, LSR, ZeroPageX, 6),
        (0x4E, LSR, Absolute, 6),
        (0x5E, LSR, AbsoluteX, 7),
        (0x2A, ROL, Implied, 2),
        (0x26, ROL, ZeroPage, 5),
        (0x36, ROL, ZeroPageX, 6),
        (0x2E, ROL, Absolute, 6),
        (0x3E, ROL, AbsoluteX, 7),
        (0x6A, ROR, Implied, 2),
        (0x66, ROR, ZeroPage, 5),
        (0x76, ROR, ZeroPageX, 6),
        (0x6E, ROR, Absolute, 6),
        (0x7E, ROR, AbsoluteX, 7),
        // Register increments and transfers
        (0xE8, INX, Implied, 2),
        (0xC8, INY, Implied, 2),
        (0xCA, DEX, Implied, 2),
        (0x88, DEY, Implied, 2),
        (0xAA, TAX, Implied, 2),
        (0xA8, TAY, Implied, 2),
        (0x8A, TXA, Implied, 2),
        (0x98, TYA, Implied, 2),
        (0xBA, TSX, Implied, 2),
        (0x9A, TXS, Implied, 2),
        // Stack
        (0x48, PHA, Implied, 3),
        (0x08, PHP, Implied, 3),
        (0x68, PLA, Implied, 4),
        (0x28, PLP, Implied, 4),
        // Control flow
        (0x4C, JMP, Absolute, 3),
        (0x20, JSR, Absolute, 6),
        (0x60, RTS, Implied, 6),
        (0x40, RTI, Implied, 6),
        (0x00, BRK, Implied, 7),
        (0x10, BPL, Relative, 2),
        (0x30, BMI, Relative, 2),
        (0x50, BVC, Relative, 2),
        (0x70, BVS, Relative, 2),
        (0x90, BCC, Relative, 2),
        (0xB0, BCS, Relative, 2),
        (0xD0, BNE, Relative, 2),
        (0xF0, BEQ, Relative, 2),
        // Flags
        (0x18, CLC, Implied, 2),
        (0x38, SEC, Implied, 2),
        (0x58, CLI, Implied, 2),
        (0x78, SEI, Implied, 2),
        (0xB8, CLV, Implied, 2),
        (0xD8, CLD, Implied, 2),
        (0xF8, SED, Implied, 2),
        (0xEA, NOP, Implied, 2),
    ]
};

/// Opcode byte to descriptor lookup
pub struct InstructionTable {
    entries: [Option<InstructionInfo>; 256],
}

impl InstructionTable {
    /// Build a fresh table. Prefer [`InstructionTable::global`].
    pub fn new() -> Self {
        let mut entries = [None; 256];
        for &(code, opcode, mode, cycles) in INSTRUCTIONS {
            entries[code as usize] = Some(InstructionInfo {
                code,
                opcode,
                mode,
                cycles,
                description: opcode.description(),
                execute: opcode.handler(),
            });
        }
        Self { entries }
    }

    /// Process-wide table, built on first use
    pub fn global() -> &'static Self {
        static TABLE: OnceLock<InstructionTable> = OnceLock::new();
        TABLE.get_or_init(Self::new)
    }

    pub fn get(&self, code: u8) -> Option<&InstructionInfo> {
        self.entries[code as usize].as_ref()
    }

    /// Iterate descriptors in opcode order
    pub fn iter(&self) -> impl Iterator<Item = &InstructionInfo> {
        self.entries.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InstructionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstructionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionTable")
            .field("len", &self.len())
            .finish()
    }
}

// Operand resolution

fn operand_address(
    regs: &mut Registers,
    bus: &mut dyn Bus,
    mode: AddressingMode,
) -> Result<u16, CpuError> {
    let address = match mode {
        AddressingMode::ZeroPage => regs.fetch(bus) as u16,
        // Zero page indexing wraps inside page zero
        AddressingMode::ZeroPageX => regs.fetch(bus).wrapping_add(regs.x) as u16,
        AddressingMode::ZeroPageY => regs.fetch(bus).wrapping_add(regs.y) as u16,
        AddressingMode::Absolute => regs.fetch_word(bus),
        // Index is added to the full 16-bit base
        AddressingMode::AbsoluteX => regs.fetch_word(bus).wrapping_add(regs.x as u16),
        AddressingMode::AbsoluteY => regs.fetch_word(bus).wrapping_add(regs.y as u16),
        AddressingMode::Implied | AddressingMode::Immediate | AddressingMode::Relative => {
            return Err(CpuError::InvalidAddressingMode(mode))
        }
    };
    Ok(address)
}

fn read_operand(
    regs: &mut Registers,
    bus: &mut dyn Bus,
    mode: AddressingMode,
) -> Result<u8, CpuError> {
    if mode == AddressingMode::Immediate {
        return Ok(regs.fetch(bus));
    }
    let address = operand_address(regs, bus, mode)?;
    Ok(bus.read(address))
}

// Loads and stores

fn lda(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    regs.a = value;
    regs.update_zero_and_negative(value);
    Ok(())
}

fn ldx(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    regs.x = value;
    regs.update_zero_and_negative(value);
    Ok(())
}

fn ldy(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    regs.y = value;
    regs.update_zero_and_negative(value);
    Ok(())
}

fn sta(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let address = operand_address(regs, bus, mode)?;
    bus.write(address, regs.a)?;
    Ok(())
}

fn stx(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let address = operand_address(regs, bus, mode)?;
    bus.write(address, regs.x)?;
    Ok(())
}

fn sty(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let address = operand_address(regs, bus, mode)?;
    bus.write(address, regs.y)?;
    Ok(())
}

// Arithmetic and logic

/// Binary add of `value` and carry into A. Decimal mode is not honored.
fn add_with_carry(regs: &mut Registers, value: u8) {
    let carry = regs.status.contains(StatusFlags::CARRY) as u16;
    let sum = regs.a as u16 + value as u16 + carry;
    let result = sum as u8;
    regs.status.set(StatusFlags::CARRY, sum > 0xFF);
    regs.status.set(
        StatusFlags::OVERFLOW,
        (regs.a ^ result) & (value ^ result) & 0x80 != 0,
    );
    regs.a = result;
    regs.update_zero_and_negative(result);
}

fn adc(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    add_with_carry(regs, value);
    Ok(())
}

fn sbc(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    add_with_carry(regs, !value);
    Ok(())
}

fn and(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    regs.a &= value;
    regs.update_zero_and_negative(regs.a);
    Ok(())
}

fn ora(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    regs.a |= value;
    regs.update_zero_and_negative(regs.a);
    Ok(())
}

fn eor(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    regs.a ^= value;
    regs.update_zero_and_negative(regs.a);
    Ok(())
}

fn bit(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    regs.status.set(StatusFlags::ZERO, regs.a & value == 0);
    regs.status.set(StatusFlags::NEGATIVE, test_bit(value, 7));
    regs.status.set(StatusFlags::OVERFLOW, test_bit(value, 6));
    Ok(())
}

fn compare(regs: &mut Registers, register: u8, value: u8) {
    regs.status.set(StatusFlags::CARRY, register >= value);
    regs.update_zero_and_negative(register.wrapping_sub(value));
}

fn cmp(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    let register = regs.a;
    compare(regs, register, value);
    Ok(())
}

fn cpx(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    let register = regs.x;
    compare(regs, register, value);
    Ok(())
}

fn cpy(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let value = read_operand(regs, bus, mode)?;
    let register = regs.y;
    compare(regs, register, value);
    Ok(())
}

// Read-modify-write

/// Apply `op` to memory, or to A when the mode is implied.
fn read_modify_write(
    regs: &mut Registers,
    bus: &mut dyn Bus,
    mode: AddressingMode,
    op: fn(&mut Registers, u8) -> u8,
) -> Result<(), CpuError> {
    if mode == AddressingMode::Implied {
        let value = regs.a;
        regs.a = op(regs, value);
        return Ok(());
    }
    let address = operand_address(regs, bus, mode)?;
    let value = bus.read(address);
    let result = op(regs, value);
    bus.write(address, result)?;
    Ok(())
}

fn shift_left(regs: &mut Registers, value: u8) -> u8 {
    let result = value << 1;
    regs.status.set(StatusFlags::CARRY, test_bit(value, 7));
    regs.update_zero_and_negative(result);
    result
}

fn shift_right(regs: &mut Registers, value: u8) -> u8 {
    let result = value >> 1;
    regs.status.set(StatusFlags::CARRY, test_bit(value, 0));
    regs.update_zero_and_negative(result);
    result
}

fn rotate_left(regs: &mut Registers, value: u8) -> u8 {
    let mut result = value << 1;
    if regs.status.contains(StatusFlags::CARRY) {
        result = set_bit(result, 0);
    }
    regs.status.set(StatusFlags::CARRY, test_bit(value, 7));
    regs.update_zero_and_negative(result);
    result
}

fn rotate_right(regs: &mut Registers, value: u8) -> u8 {
    let mut result = value >> 1;
    if regs.status.contains(StatusFlags::CARRY) {
        result = set_bit(result, 7);
    }
    regs.status.set(StatusFlags::CARRY, test_bit(value, 0));
    regs.update_zero_and_negative(result);
    result
}

fn increment(regs: &mut Registers, value: u8) -> u8 {
    let result = value.wrapping_add(1);
    regs.update_zero_and_negative(result);
    result
}

fn decrement(regs: &mut Registers, value: u8) -> u8 {
    let result = value.wrapping_sub(1);
    regs.update_zero_and_negative(result);
    result
}

fn asl(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    read_modify_write(regs, bus, mode, shift_left)
}

fn lsr(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    read_modify_write(regs, bus, mode, shift_right)
}

fn rol(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    read_modify_write(regs, bus, mode, rotate_left)
}

fn ror(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    read_modify_write(regs, bus, mode, rotate_right)
}

fn inc(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    read_modify_write(regs, bus, mode, increment)
}

fn dec(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    read_modify_write(regs, bus, mode, decrement)
}

// Register operations

fn inx(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    let value = regs.x;
    regs.x = increment(regs, value);
    Ok(())
}

fn iny(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    let value = regs.y;
    regs.y = increment(regs, value);
    Ok(())
}

fn dex(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    let value = regs.x;
    regs.x = decrement(regs, value);
    Ok(())
}

fn dey(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    let value = regs.y;
    regs.y = decrement(regs, value);
    Ok(())
}

fn tax(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.x = regs.a;
    regs.update_zero_and_negative(regs.x);
    Ok(())
}

fn tay(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.y = regs.a;
    regs.update_zero_and_negative(regs.y);
    Ok(())
}

fn txa(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.a = regs.x;
    regs.update_zero_and_negative(regs.a);
    Ok(())
}

fn tya(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.a = regs.y;
    regs.update_zero_and_negative(regs.a);
    Ok(())
}

fn tsx(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.x = regs.sp;
    regs.update_zero_and_negative(regs.x);
    Ok(())
}

fn txs(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.sp = regs.x;
    Ok(())
}

// Stack

fn pha(regs: &mut Registers, bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.push(bus, regs.a)?;
    Ok(())
}

fn php(regs: &mut Registers, bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    let status = regs.status | StatusFlags::BREAK | StatusFlags::UNUSED;
    regs.push(bus, status.bits())?;
    Ok(())
}

fn pla(regs: &mut Registers, bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    let value = regs.pop(bus);
    regs.a = value;
    regs.update_zero_and_negative(value);
    Ok(())
}

fn pull_status(regs: &mut Registers, bus: &mut dyn Bus) {
    let value = regs.pop(bus);
    regs.status = StatusFlags::from_bits_truncate(value)
        .difference(StatusFlags::BREAK | StatusFlags::UNUSED);
}

fn plp(regs: &mut Registers, bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    pull_status(regs, bus);
    Ok(())
}

// Control flow

fn jmp(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    regs.pc = operand_address(regs, bus, mode)?;
    Ok(())
}

/// Pushes the address of the next instruction, high byte first.
fn jsr(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let target = operand_address(regs, bus, mode)?;
    let return_address = regs.pc;
    regs.push(bus, (return_address >> 8) as u8)?;
    regs.push(bus, return_address as u8)?;
    regs.pc = target;
    Ok(())
}

fn pull_pc(regs: &mut Registers, bus: &mut dyn Bus) {
    let lo = regs.pop(bus) as u16;
    let hi = regs.pop(bus) as u16;
    regs.pc = (hi << 8) | lo;
}

fn rts(regs: &mut Registers, bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    pull_pc(regs, bus);
    Ok(())
}

fn rti(regs: &mut Registers, bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    pull_status(regs, bus);
    pull_pc(regs, bus);
    Ok(())
}

fn brk(regs: &mut Registers, bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    // Skip the padding byte that follows BRK
    let return_address = regs.pc.wrapping_add(1);
    regs.push(bus, (return_address >> 8) as u8)?;
    regs.push(bus, return_address as u8)?;
    let status = regs.status | StatusFlags::BREAK | StatusFlags::UNUSED;
    regs.push(bus, status.bits())?;
    regs.status.insert(StatusFlags::INTERRUPT_DISABLE);

    let lo = bus.read(IRQ_VECTOR) as u16;
    let hi = bus.read(IRQ_VECTOR.wrapping_add(1)) as u16;
    regs.pc = (hi << 8) | lo;
    Ok(())
}

fn nop(_regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    Ok(())
}

/// Fetch the signed offset and apply it to PC when `taken`.
fn branch(
    regs: &mut Registers,
    bus: &mut dyn Bus,
    mode: AddressingMode,
    taken: bool,
) -> Result<(), CpuError> {
    if mode != AddressingMode::Relative {
        return Err(CpuError::InvalidAddressingMode(mode));
    }
    let offset = regs.fetch(bus) as i8;
    if taken {
        regs.pc = regs.pc.wrapping_add_signed(offset as i16);
    }
    Ok(())
}

fn bpl(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let taken = !regs.status.contains(StatusFlags::NEGATIVE);
    branch(regs, bus, mode, taken)
}

fn bmi(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let taken = regs.status.contains(StatusFlags::NEGATIVE);
    branch(regs, bus, mode, taken)
}

fn bvc(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let taken = !regs.status.contains(StatusFlags::OVERFLOW);
    branch(regs, bus, mode, taken)
}

fn bvs(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let taken = regs.status.contains(StatusFlags::OVERFLOW);
    branch(regs, bus, mode, taken)
}

fn bcc(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let taken = !regs.status.contains(StatusFlags::CARRY);
    branch(regs, bus, mode, taken)
}

fn bcs(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let taken = regs.status.contains(StatusFlags::CARRY);
    branch(regs, bus, mode, taken)
}

fn bne(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let taken = !regs.status.contains(StatusFlags::ZERO);
    branch(regs, bus, mode, taken)
}

fn beq(regs: &mut Registers, bus: &mut dyn Bus, mode: AddressingMode) -> Result<(), CpuError> {
    let taken = regs.status.contains(StatusFlags::ZERO);
    branch(regs, bus, mode, taken)
}

// Flags

fn clc(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.status.remove(StatusFlags::CARRY);
    Ok(())
}

fn sec(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.status.insert(StatusFlags::CARRY);
    Ok(())
}

fn cli(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.status.remove(StatusFlags::INTERRUPT_DISABLE);
    Ok(())
}

fn sei(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.status.insert(StatusFlags::INTERRUPT_DISABLE);
    Ok(())
}

fn clv(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.status.remove(StatusFlags::OVERFLOW);
    Ok(())
}

fn cld(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.status.remove(StatusFlags::DECIMAL);
    Ok(())
}

fn sed(regs: &mut Registers, _bus: &mut dyn Bus, _mode: AddressingMode) -> Result<(), CpuError> {
    regs.status.insert(StatusFlags::DECIMAL);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusError;

    struct TestBus {
        memory: Vec<u8>,
    }

    impl TestBus {
        fn new() -> Self {
            Self { memory: vec![0; 0x10000] }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, address: u16) -> u8 {
            self.memory[address as usize]
        }

        fn write(&mut self, address: u16, value: u8) -> Result<(), BusError> {
            self.memory[address as usize] = value;
            Ok(())
        }
    }

    /// Place `operands` at PC and run the handler for `code`.
    fn execute(regs: &mut Registers, bus: &mut TestBus, code: u8, operands: &[u8]) {
        let start = regs.pc as usize;
        bus.memory[start..start + operands.len()].copy_from_slice(operands);
        let info = InstructionTable::global().get(code).copied().unwrap();
        (info.execute)(regs, bus, info.mode).unwrap();
    }

    #[test]
    fn test_table_contents() {
        let table = InstructionTable::global();
        let lda = table.get(0xA9).unwrap();
        assert_eq!(lda.opcode, Opcode::LDA);
        assert_eq!(lda.mode, AddressingMode::Immediate);
        assert_eq!(lda.cycles, 2);
        assert_eq!(lda.description, "Load accumulator");
        assert!(table.get(0x02).is_none());
        assert!(table.get(0xFF).is_none());
        for info in table.iter() {
            assert_eq!(table.get(info.code).map(|i| i.code), Some(info.code));
        }
    }

    #[test]
    fn test_table_has_unique_codes() {
        let mut seen = [false; 256];
        for &(code, _, _, _) in INSTRUCTIONS {
            assert!(!seen[code as usize], "duplicate opcode {code:#04X}");
            seen[code as usize] = true;
        }
        assert_eq!(InstructionTable::global().len(), INSTRUCTIONS.len());
    }

    #[test]
    fn test_zero_page_x_wraps() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        bus.memory[0x0010] = 0x42;
        regs.x = 0x20;
        // LDA $F0,X -> $0010
        execute(&mut regs, &mut bus, 0xB5, &[0xF0]);
        assert_eq!(regs.a, 0x42);
    }

    #[test]
    fn test_absolute_x_crosses_page() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        bus.memory[0x0300] = 0x99;
        regs.x = 0x01;
        // LDA $02FF,X -> $0300
        execute(&mut regs, &mut bus, 0xBD, &[0xFF, 0x02]);
        assert_eq!(regs.a, 0x99);
    }

    #[test]
    fn test_adc_carry_and_overflow() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        regs.a = 0x7F;
        execute(&mut regs, &mut bus, 0x69, &[0x01]);
        assert_eq!(regs.a, 0x80);
        assert!(regs.status.contains(StatusFlags::OVERFLOW));
        assert!(regs.status.contains(StatusFlags::NEGATIVE));
        assert!(!regs.status.contains(StatusFlags::CARRY));

        regs.a = 0xFF;
        execute(&mut regs, &mut bus, 0x69, &[0x01]);
        assert_eq!(regs.a, 0x00);
        assert!(regs.status.contains(StatusFlags::CARRY));
        assert!(regs.status.contains(StatusFlags::ZERO));
        assert!(!regs.status.contains(StatusFlags::OVERFLOW));
    }

    #[test]
    fn test_sbc_borrow() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        regs.a = 0x05;
        regs.status.insert(StatusFlags::CARRY);
        execute(&mut regs, &mut bus, 0xE9, &[0x03]);
        assert_eq!(regs.a, 0x02);
        assert!(regs.status.contains(StatusFlags::CARRY));

        execute(&mut regs, &mut bus, 0xE9, &[0x03]);
        assert_eq!(regs.a, 0xFF);
        assert!(!regs.status.contains(StatusFlags::CARRY));
        assert!(regs.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_compare_flags() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        regs.a = 0x40;
        execute(&mut regs, &mut bus, 0xC9, &[0x40]);
        assert!(regs.status.contains(StatusFlags::ZERO | StatusFlags::CARRY));

        execute(&mut regs, &mut bus, 0xC9, &[0x41]);
        assert!(!regs.status.contains(StatusFlags::CARRY));
        assert!(regs.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_bit_flags() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        bus.memory[0x0020] = 0xC0;
        regs.a = 0x01;
        execute(&mut regs, &mut bus, 0x24, &[0x20]);
        assert!(regs.status.contains(StatusFlags::ZERO));
        assert!(regs.status.contains(StatusFlags::NEGATIVE));
        assert!(regs.status.contains(StatusFlags::OVERFLOW));
    }

    #[test]
    fn test_shifts_on_accumulator() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        regs.a = 0x81;
        execute(&mut regs, &mut bus, 0x0A, &[]);
        assert_eq!(regs.a, 0x02);
        assert!(regs.status.contains(StatusFlags::CARRY));

        // ROL pulls the carry into bit 0
        execute(&mut regs, &mut bus, 0x2A, &[]);
        assert_eq!(regs.a, 0x05);
        assert!(!regs.status.contains(StatusFlags::CARRY));

        execute(&mut regs, &mut bus, 0x4A, &[]);
        assert_eq!(regs.a, 0x02);
        assert!(regs.status.contains(StatusFlags::CARRY));

        execute(&mut regs, &mut bus, 0x6A, &[]);
        assert_eq!(regs.a, 0x81);
        assert!(!regs.status.contains(StatusFlags::CARRY));
        assert!(regs.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_inc_dec_memory() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        bus.memory[0x0044] = 0xFF;
        execute(&mut regs, &mut bus, 0xE6, &[0x44]);
        assert_eq!(bus.memory[0x0044], 0x00);
        assert!(regs.status.contains(StatusFlags::ZERO));

        execute(&mut regs, &mut bus, 0xC6, &[0x44]);
        assert_eq!(bus.memory[0x0044], 0xFF);
        assert!(regs.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_php_plp_masks_break() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        regs.status = StatusFlags::CARRY;
        execute(&mut regs, &mut bus, 0x08, &[]);
        assert_eq!(bus.memory[0x01FD], 0x31);

        regs.status = StatusFlags::empty();
        execute(&mut regs, &mut bus, 0x28, &[]);
        assert_eq!(regs.status, StatusFlags::CARRY);
    }

    #[test]
    fn test_brk_and_rti() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        bus.memory[0xFFFE] = 0x00;
        bus.memory[0xFFFF] = 0x90;
        regs.pc = 0x8001;
        regs.status = StatusFlags::CARRY;
        execute(&mut regs, &mut bus, 0x00, &[]);
        assert_eq!(regs.pc, 0x9000);
        assert!(regs.status.contains(StatusFlags::INTERRUPT_DISABLE));
        assert_eq!(regs.sp, 0x00);

        execute(&mut regs, &mut bus, 0x40, &[]);
        assert_eq!(regs.pc, 0x8002);
        assert_eq!(regs.status, StatusFlags::CARRY);
        assert_eq!(regs.sp, 0xFD);
    }

    #[test]
    fn test_branch_backwards() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        regs.pc = 0x8009;
        // BNE -3 with Z clear
        execute(&mut regs, &mut bus, 0xD0, &[0xFD]);
        assert_eq!(regs.pc, 0x8007);
    }

    #[test]
    fn test_invalid_addressing_mode() {
        let mut regs = Registers::default();
        let mut bus = TestBus::new();
        assert_eq!(
            sta(&mut regs, &mut bus, AddressingMode::Immediate),
            Err(CpuError::InvalidAddressingMode(AddressingMode::Immediate))
        );
        assert_eq!(
            bne(&mut regs, &mut bus, AddressingMode::Absolute),
            Err(CpuError::InvalidAddressingMode(AddressingMode::Absolute))
        );
    }
}
