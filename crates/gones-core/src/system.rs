//! NES System Integration
//!
//! This module wires the CPU, bus and PPU into the host loop: one CPU
//! instruction, then three PPU cycles for every CPU cycle it took.

use std::path::Path;

use crate::bus::{Bus, BusError};
use crate::cartridge::{Cartridge, CartridgeError};
use crate::controller::Controller;
use crate::cpu::{Bus as CpuBus, Cpu, CpuError};
use crate::ppu::{Frame, Ppu};

/// The PPU runs at three times the CPU clock
pub const PPU_CYCLES_PER_CPU_CYCLE: u32 = 3;

/// NES System - integrates all components
#[derive(Debug)]
pub struct NesSystem {
    cpu: Cpu<Bus>,
    /// Frame counter
    frame_count: u64,
}

impl NesSystem {
    /// Create a system around `cartridge` and reset it
    pub fn new(cartridge: Cartridge) -> Self {
        let mut system = Self {
            cpu: Cpu::new(Bus::new(cartridge)),
            frame_count: 0,
        };
        system.reset();
        system
    }

    /// Create a system from an iNES image in memory
    pub fn from_rom(rom_data: &[u8]) -> Result<Self, CartridgeError> {
        Ok(Self::new(Cartridge::from_bytes(rom_data)?))
    }

    /// Create a system from an iNES file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        Ok(Self::new(Cartridge::load(path)?))
    }

    /// Reset the CPU through the reset vector
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.frame_count = 0;
    }

    /// Run one instruction and clock the PPU to match.
    /// Returns true when that completed a frame.
    pub fn step(&mut self) -> Result<bool, CpuError> {
        let cycles = self.cpu.run()? as u32;
        let completed = self
            .cpu
            .bus_mut()
            .ppu_mut()
            .run(cycles * PPU_CYCLES_PER_CPU_CYCLE)
            .is_some();

        if completed {
            self.frame_count += 1;
        }
        Ok(completed)
    }

    /// Step until the PPU completes a frame
    pub fn run_frame(&mut self) -> Result<&Frame, CpuError> {
        while !self.step()? {}
        Ok(self.ppu().frame())
    }

    /// Run for N frames
    pub fn run_frames(&mut self, frames: u64) -> Result<(), CpuError> {
        for _ in 0..frames {
            self.run_frame()?;
        }
        Ok(())
    }

    /// Get CPU reference
    pub fn cpu(&self) -> &Cpu<Bus> {
        &self.cpu
    }

    /// Get PPU reference
    pub fn ppu(&self) -> &Ppu {
        self.cpu.bus().ppu()
    }

    /// Controller 1, for the host to feed button state
    pub fn controller_mut(&mut self) -> &mut Controller {
        self.cpu.bus_mut().controller_mut()
    }

    /// Get frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// CPU cycles since the last reset
    pub fn total_cycles(&self) -> u64 {
        self.cpu.total_cycles()
    }

    /// Read a byte from memory via the bus
    pub fn read_memory(&mut self, address: u16) -> u8 {
        self.cpu.bus_mut().read(address)
    }

    /// Write a byte to memory via the bus
    pub fn write_memory(&mut self, address: u16, value: u8) -> Result<(), BusError> {
        self.cpu.bus_mut().write(address, value)
    }
}
