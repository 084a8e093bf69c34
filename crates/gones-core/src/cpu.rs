//! CPU module - 2A03 (6502 variant) execution engine
//!
//! The NES uses a modified 6502 CPU without decimal mode. [`Cpu::run`] executes
//! exactly one instruction and returns the number of cycles it cost; every
//! memory access goes through the [`Bus`] trait.

use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

use crate::bits::test_bit;
use crate::bus::BusError;
use crate::instructions::{AddressingMode, InstructionTable};

/// Base address of the one-page stack window ($0100-$01FF)
pub const STACK_BASE: u16 = 0x0100;
/// First program ROM address; the PC starts here before any reset
pub const PRG_START: u16 = 0x8000;
/// Reset vector ($FFFC/$FFFD)
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ/BRK vector ($FFFE/$FFFF)
pub const IRQ_VECTOR: u16 = 0xFFFE;

const INITIAL_SP: u8 = 0xFD;

bitflags! {
    /// CPU status flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u8 {
        const CARRY = 0b0000_0001;
        const ZERO = 0b0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0100;
        const DECIMAL = 0b0000_1000;
        /// Only present in the copy pushed by BRK and PHP
        const BREAK = 0b0001_0000;
        const UNUSED = 0b0010_0000;
        const OVERFLOW = 0b0100_0000;
        const NEGATIVE = 0b1000_0000;
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N:{} V:{} D:{} I:{} Z:{} C:{}",
            self.contains(Self::NEGATIVE) as u8,
            self.contains(Self::OVERFLOW) as u8,
            self.contains(Self::DECIMAL) as u8,
            self.contains(Self::INTERRUPT_DISABLE) as u8,
            self.contains(Self::ZERO) as u8,
            self.contains(Self::CARRY) as u8,
        )
    }
}

/// 2A03 CPU registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,    // Accumulator
    pub x: u8,    // X index register
    pub y: u8,    // Y index register
    pub sp: u8,   // Stack pointer (offset into $0100-$01FF)
    pub pc: u16,  // Program counter
    pub status: StatusFlags,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: INITIAL_SP,
            pc: PRG_START,
            status: StatusFlags::empty(),
        }
    }
}

impl Registers {
    /// Read the byte at PC and advance PC by one.
    pub fn fetch<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    /// Fetch two bytes, low byte first.
    pub fn fetch_word<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch(bus) as u16;
        let hi = self.fetch(bus) as u16;
        (hi << 8) | lo
    }

    /// Store a byte at the stack pointer, then increment the pointer.
    pub fn push<B: Bus + ?Sized>(&mut self, bus: &mut B, value: u8) -> Result<(), BusError> {
        bus.write(STACK_BASE | self.sp as u16, value)?;
        self.sp = self.sp.wrapping_add(1);
        Ok(())
    }

    /// Decrement the stack pointer, then load the byte it points at.
    pub fn pop<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        self.sp = self.sp.wrapping_sub(1);
        bus.read(STACK_BASE | self.sp as u16)
    }

    /// Set Z when `result` is zero and N from its bit 7.
    pub fn update_zero_and_negative(&mut self, result: u8) {
        self.status.set(StatusFlags::ZERO, result == 0);
        self.status.set(StatusFlags::NEGATIVE, test_bit(result, 7));
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X}",
            self.a,
            self.x,
            self.y,
            self.status.bits(),
            self.sp
        )
    }
}

/// CPU error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("unimplemented opcode {opcode:#04X} at {pc:#06X}")]
    UnimplementedOpcode { opcode: u8, pc: u16 },
    #[error("addressing mode {0:?} does not produce an operand address")]
    InvalidAddressingMode(AddressingMode),
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Bus trait for memory and I/O access
pub trait Bus {
    /// Read a byte from the given address. Reads may have side effects.
    fn read(&mut self, address: u16) -> u8;
    /// Write a byte to the given address
    fn write(&mut self, address: u16, value: u8) -> Result<(), BusError>;
}

/// CPU emulator state
#[derive(Debug)]
pub struct Cpu<B> {
    registers: Registers,
    bus: B,
    table: &'static InstructionTable,
    /// Total cycles executed
    total_cycles: u64,
}

impl<B: Bus> Cpu<B> {
    /// Create a new CPU that owns `bus`. PC starts at $8000.
    pub fn new(bus: B) -> Self {
        Self {
            registers: Registers::default(),
            bus,
            table: InstructionTable::global(),
            total_cycles: 0,
        }
    }

    /// Reset registers and load PC from the reset vector
    pub fn reset(&mut self) {
        self.registers = Registers::default();
        self.total_cycles = 0;
        let lo = self.bus.read(RESET_VECTOR) as u16;
        let hi = self.bus.read(RESET_VECTOR.wrapping_add(1)) as u16;
        self.registers.pc = (hi << 8) | lo;
        log::info!("Reset CPU, PC set to: {:#06X}", self.registers.pc);
    }

    /// Get CPU registers
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Get mutable CPU registers
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Get total cycles executed
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Read the byte at PC through the bus and advance PC
    pub fn fetch(&mut self) -> u8 {
        self.registers.fetch(&mut self.bus)
    }

    /// Execute one instruction and return its cycle cost.
    ///
    /// An opcode missing from the instruction table is fatal: the error is
    /// returned and the CPU state must not be stepped further.
    pub fn run(&mut self) -> Result<u8, CpuError> {
        let pc = self.registers.pc;
        let opcode = self.fetch();
        let info = *self
            .table
            .get(opcode)
            .ok_or(CpuError::UnimplementedOpcode { opcode, pc })?;

        log::trace!(
            "{:04X}  {:02X}  {:?} {:?}  {}",
            pc,
            opcode,
            info.opcode,
            info.mode,
            self.registers
        );

        (info.execute)(&mut self.registers, &mut self.bus, info.mode)?;
        self.total_cycles += info.cycles as u64;
        Ok(info.cycles)
    }
}
