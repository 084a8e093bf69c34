//! gones core - Pure Rust NES emulator library
//!
//! This crate provides the processor, address bus and background video unit of
//! the Nintendo Entertainment System, plus the thin cartridge and controller
//! collaborators they are wired to. It contains no windowing dependencies.

#![forbid(unsafe_code)]

/// Bit helpers shared by the CPU and PPU
pub mod bits;
/// CPU module containing the 2A03 (6502 variant) execution engine
pub mod cpu;
/// Opcode table and instruction handlers
pub mod instructions;
/// Memory bus and mapping
pub mod bus;
/// PPU (Picture Processing Unit) implementation
pub mod ppu;
/// Cartridge image loading
pub mod cartridge;
/// Standard controller
pub mod controller;
/// Integration module for complete NES system
pub mod system;

pub use bus::{Bus, BusError};
pub use cartridge::{Cartridge, CartridgeError};
pub use controller::{Buttons, Controller};
pub use cpu::{Cpu, CpuError, Registers, StatusFlags};
pub use ppu::{Frame, Ppu};
pub use system::NesSystem;
