//! Cartridge loading
//!
//! Parses iNES images into fixed program (PRG) and graphics (CHR) blocks.
//! Only the fixed NROM layout is supported: one 16KB bank mirrored across
//! $8000-$FFFF, or two banks mapped linearly.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// iNES header size
pub const HEADER_SIZE: usize = 16;
/// PRG ROM bank size
pub const PRG_BANK_SIZE: usize = 16 * 1024;
/// CHR ROM bank size
pub const CHR_BANK_SIZE: usize = 8 * 1024;

const MAGIC: [u8; 4] = [b'N', b'E', b'S', 0x1A];

/// iNES header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InesHeader {
    /// PRG ROM size in 16KB units
    pub prg_rom_banks: u8,
    /// CHR ROM size in 8KB units
    pub chr_rom_banks: u8,
    /// Flags 6
    pub flags_6: u8,
    /// Flags 7
    pub flags_7: u8,
}

impl InesHeader {
    /// Parse an iNES header from bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CartridgeError::InvalidHeader("too short"));
        }
        if bytes[0..4] != MAGIC {
            return Err(CartridgeError::InvalidHeader("invalid magic"));
        }

        Ok(Self {
            prg_rom_banks: bytes[4],
            chr_rom_banks: bytes[5],
            flags_6: bytes[6],
            flags_7: bytes[7],
        })
    }

    /// Get the mapper number from flags
    pub fn mapper_number(&self) -> u8 {
        (self.flags_6 >> 4) | (self.flags_7 & 0xF0)
    }

    pub fn prg_rom_len(&self) -> usize {
        self.prg_rom_banks as usize * PRG_BANK_SIZE
    }

    pub fn chr_rom_len(&self) -> usize {
        self.chr_rom_banks as usize * CHR_BANK_SIZE
    }
}

/// Cartridge error types
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("failed to read cartridge image: {0}")]
    Io(#[from] io::Error),
    #[error("invalid iNES header: {0}")]
    InvalidHeader(&'static str),
    #[error("cartridge image truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Read-only program and graphics blocks
#[derive(Debug, Clone, Default)]
pub struct Cartridge {
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
}

impl Cartridge {
    /// Build a cartridge from raw blocks
    pub fn new(prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        Self { prg_rom, chr_rom }
    }

    /// Parse an iNES image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CartridgeError> {
        let header = InesHeader::parse(bytes)?;

        let prg_end = HEADER_SIZE + header.prg_rom_len();
        let chr_end = prg_end + header.chr_rom_len();
        if bytes.len() < chr_end {
            return Err(CartridgeError::Truncated {
                expected: chr_end,
                actual: bytes.len(),
            });
        }

        if header.mapper_number() != 0 {
            log::warn!(
                "Mapper {} is not supported, treating image as NROM",
                header.mapper_number()
            );
        }

        log::info!(
            "Loaded cartridge: {} x 16KB PRG, {} x 8KB CHR",
            header.prg_rom_banks,
            header.chr_rom_banks
        );

        Ok(Self::new(
            bytes[HEADER_SIZE..prg_end].to_vec(),
            bytes[prg_end..chr_end].to_vec(),
        ))
    }

    /// Read an iNES image from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Get PRG ROM data
    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    /// Get CHR ROM data
    pub fn chr_rom(&self) -> &[u8] {
        &self.chr_rom
    }

    /// Read PRG ROM at an offset from $8000.
    ///
    /// A single bank is mirrored every 16KB. Offsets past the end of the
    /// data read as 0.
    pub fn read_prg(&self, offset: u16) -> u8 {
        let mask = if self.prg_rom.len() > PRG_BANK_SIZE {
            0x7FFF
        } else {
            0x3FFF
        };
        self.prg_rom
            .get((offset & mask) as usize)
            .copied()
            .unwrap_or(0)
    }
}
