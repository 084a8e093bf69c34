//! Memory bus and mapping
//!
//! The CPU memory map:
//! $0000-$07FF - 2KB Internal RAM
//! $0800-$1FFF - RAM mirroring (repeats every $0800 bytes)
//! $2000-$2007 - PPU registers
//! $2008-$3FFF - PPU register mirroring (every $08 bytes)
//! $4016       - Controller 1
//! $8000-$FFFF - Cartridge PRG ROM (read-only)
//!
//! Anything else is unmapped: reads return 0 and writes are dropped.

use thiserror::Error;

use crate::cartridge::Cartridge;
use crate::controller::Controller;
use crate::cpu::Bus as CpuBus;
use crate::ppu::{Ppu, PpuRegister};

/// RAM size in bytes
pub const RAM_SIZE: usize = 2048; // 2KB
/// RAM mirror mask
pub const RAM_MASK: u16 = 0x07FF;
/// Controller 1 strobe/read port
pub const CONTROLLER_PORT: u16 = 0x4016;
/// First PRG ROM address
pub const PRG_ROM_START: u16 = 0x8000;

/// Bus error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("attempted write of {data:#04X} to program ROM at {address:#06X}")]
    RomWrite { address: u16, data: u8 },
}

/// Console bus: owns RAM and every device the CPU can reach
#[derive(Debug, Clone)]
pub struct Bus {
    /// 2KB internal RAM (with mirroring)
    ram: [u8; RAM_SIZE],
    ppu: Ppu,
    controller: Controller,
    cartridge: Cartridge,
}

impl Bus {
    /// Wire a cartridge to a fresh PPU and controller
    pub fn new(cartridge: Cartridge) -> Self {
        Self {
            ram: [0; RAM_SIZE],
            ppu: Ppu::new(cartridge.chr_rom()),
            controller: Controller::new(),
            cartridge,
        }
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }
}

impl CpuBus for Bus {
    /// Read a byte from the given address
    fn read(&mut self, address: u16) -> u8 {
        match address {
            // $0000-$1FFF - Internal RAM and its mirrors
            0x0000..=0x1FFF => self.ram[(address & RAM_MASK) as usize],
            // $2000-$3FFF - PPU registers; only PPUDATA is readable
            0x2000..=0x3FFF => match PpuRegister::from_address(address) {
                PpuRegister::Data => self.ppu.read(),
                _ => 0,
            },
            CONTROLLER_PORT => self.controller.read(),
            // $8000-$FFFF - Cartridge PRG ROM
            0x8000..=0xFFFF => self.cartridge.read_prg(address - PRG_ROM_START),
            _ => 0,
        }
    }

    /// Write a byte to the given address
    fn write(&mut self, address: u16, value: u8) -> Result<(), BusError> {
        match address {
            0x0000..=0x1FFF => {
                self.ram[(address & RAM_MASK) as usize] = value;
            }
            0x2000..=0x3FFF => {
                self.ppu
                    .write_register(PpuRegister::from_address(address), value);
            }
            CONTROLLER_PORT => self.controller.write(value),
            0x8000..=0xFFFF => return Err(BusError::RomWrite { address, data: value }),
            _ => {
                log::debug!(
                    "Ignoring write of {:#04X} to unmapped address {:#06X}",
                    value,
                    address
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Buttons;

    fn bus() -> Bus {
        let mut prg = vec![0; 0x4000];
        prg[0x0000] = 0xA9;
        prg[0x3FFC] = 0x00;
        prg[0x3FFD] = 0x80;
        Bus::new(Cartridge::new(prg, vec![0; 0x2000]))
    }

    #[test]
    fn test_bus_read_write() {
        let mut bus = bus();

        bus.write(0x0000, 0x42).unwrap();
        assert_eq!(bus.read(0x0000), 0x42);

        // Test RAM mirroring
        bus.write(0x0001, 0x43).unwrap();
        assert_eq!(bus.read(0x0801), 0x43);
        assert_eq!(bus.read(0x1801), 0x43);
        bus.write(0x1FFF, 0x44).unwrap();
        assert_eq!(bus.read(0x07FF), 0x44);
    }

    #[test]
    fn test_prg_rom_mirrors_single_bank() {
        let mut bus = bus();
        assert_eq!(bus.read(0x8000), 0xA9);
        assert_eq!(bus.read(0xC000), 0xA9);
        assert_eq!(bus.read(0xFFFC), 0x00);
        assert_eq!(bus.read(0xFFFD), 0x80);
    }

    #[test]
    fn test_rom_write_is_error() {
        let mut bus = bus();
        assert_eq!(
            bus.write(0x8000, 0x01),
            Err(BusError::RomWrite { address: 0x8000, data: 0x01 })
        );
        assert_eq!(
            bus.write(0xFFFF, 0x02),
            Err(BusError::RomWrite { address: 0xFFFF, data: 0x02 })
        );
        assert_eq!(bus.read(0x8000), 0xA9);
    }

    #[test]
    fn test_unmapped_access() {
        let mut bus = bus();
        assert_eq!(bus.write(0x4000, 0x55), Ok(()));
        assert_eq!(bus.write(0x6000, 0x55), Ok(()));
        assert_eq!(bus.read(0x4000), 0);
        assert_eq!(bus.read(0x6000), 0);
    }

    #[test]
    fn test_ppu_ports_through_mirror() {
        let mut bus = bus();
        // $3FFE and $3FFF mirror $2006 and $2007
        bus.write(0x3FFE, 0x21).unwrap();
        bus.write(0x3FFE, 0x00).unwrap();
        bus.write(0x3FFF, 0x5A).unwrap();
        assert_eq!(bus.ppu().memory()[0x2100], 0x5A);

        bus.write(0x2006, 0x21).unwrap();
        bus.write(0x2006, 0x00).unwrap();
        assert_eq!(bus.read(0x2007), 0x00);
        assert_eq!(bus.read(0x200F), 0x5A);
    }

    #[test]
    fn test_write_only_ppu_ports_read_zero() {
        let mut bus = bus();
        bus.write(0x2000, 0x80).unwrap();
        assert_eq!(bus.ppu().control(), 0x80);
        assert_eq!(bus.read(0x2000), 0);
        assert_eq!(bus.read(0x2002), 0);
        assert_eq!(bus.read(0x2006), 0);
    }

    #[test]
    fn test_controller_port() {
        let mut bus = bus();
        bus.controller_mut().set_buttons(Buttons::A | Buttons::SELECT);
        bus.write(CONTROLLER_PORT, 1).unwrap();
        bus.write(CONTROLLER_PORT, 0).unwrap();
        assert_eq!(bus.read(CONTROLLER_PORT), 1);
        assert_eq!(bus.read(CONTROLLER_PORT), 0);
        assert_eq!(bus.read(CONTROLLER_PORT), 1);
    }
}
