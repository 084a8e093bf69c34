//! PPU (Picture Processing Unit) implementation
//!
//! The PPU owns its own 16KB address space:
//! $0000-$1FFF - Pattern tables (CHR ROM copied in at load, or CHR RAM)
//! $2000-$2FFF - Name tables
//! $3F00-$3FFF - Palette
//!
//! It is clocked at three times the CPU rate. Every 341 cycles one scanline
//! completes; each eighth visible scanline draws one row of background
//! tiles from the first name table, and scanline 262 ends the frame.

use crate::bits::bit;

/// Visible frame width in pixels
pub const SCREEN_WIDTH: usize = 256;
/// Visible frame height in pixels
pub const SCREEN_HEIGHT: usize = 240;

/// PPU address space size (14-bit)
pub const VRAM_SIZE: usize = 0x4000;
/// Highest valid PPU address
pub const ADDRESS_MASK: u16 = 0x3FFF;
/// First name table
pub const NAME_TABLE_BASE: u16 = 0x2000;

/// PPU cycles per scanline
pub const CYCLES_PER_SCANLINE: u32 = 341;
/// Scanline count per frame; reaching it ends the frame
pub const SCANLINES_PER_FRAME: u16 = 262;
/// Last scanline that can complete a tile row
pub const VISIBLE_SCANLINES: u16 = 240;

const TILES_PER_ROW: usize = 32;
const TILE_SIZE: usize = 8;
/// Bytes per tile in the pattern table (two 8-byte bit planes)
const TILE_BYTES: usize = 16;

/// Fixed background palette, colour index to 0x00RRGGBB
pub const PALETTE: [u32; 4] = [0x000000, 0x545454, 0xA0A0A0, 0xFFFFFF];

/// PPU registers, selected by the low three bits of $2000-$3FFF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuRegister {
    /// $2000 - PPUCTRL
    Control,
    /// $2001 - PPUMASK
    Mask,
    /// $2002 - PPUSTATUS
    Status,
    /// $2003 - OAMADDR
    OamAddress,
    /// $2004 - OAMDATA
    OamData,
    /// $2005 - PPUSCROLL
    Scroll,
    /// $2006 - PPUADDR
    Address,
    /// $2007 - PPUDATA
    Data,
}

impl PpuRegister {
    /// Decode any CPU address in the register window, mirrors included
    pub fn from_address(address: u16) -> Self {
        match address & 0x0007 {
            0 => PpuRegister::Control,
            1 => PpuRegister::Mask,
            2 => PpuRegister::Status,
            3 => PpuRegister::OamAddress,
            4 => PpuRegister::OamData,
            5 => PpuRegister::Scroll,
            6 => PpuRegister::Address,
            _ => PpuRegister::Data,
        }
    }
}

/// Two-write PPUADDR latch, high byte first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressLatch {
    high: u8,
    low: u8,
    /// Next `update` writes the low byte
    write_low: bool,
}

impl AddressLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte from a PPUADDR write
    pub fn update(&mut self, data: u8) {
        if self.write_low {
            self.low = data;
        } else {
            self.high = data;
        }
        self.write_low = !self.write_low;

        let address = self.get();
        if address > ADDRESS_MASK {
            self.store(address & ADDRESS_MASK);
        }
    }

    /// Load a full address and restart the high/low sequence
    pub fn set(&mut self, address: u16) {
        self.store(address & ADDRESS_MASK);
        self.write_low = false;
    }

    /// Advance by one, wrapping within the 14-bit space
    pub fn increment(&mut self) {
        self.store(self.get().wrapping_add(1) & ADDRESS_MASK);
    }

    pub fn get(&self) -> u16 {
        ((self.high as u16) << 8) | self.low as u16
    }

    fn store(&mut self, address: u16) {
        self.high = (address >> 8) as u8;
        self.low = address as u8;
    }
}

/// Decoded 8x8 tile of 2-bit colour indices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile {
    pixels: [[u8; TILE_SIZE]; TILE_SIZE],
}

impl Tile {
    /// Decode a 16-byte pattern table entry. Bytes 0-7 hold the low bit
    /// plane, bytes 8-15 the high plane; bit 7 is the leftmost pixel.
    /// Missing bytes decode as 0.
    pub fn decode(bytes: &[u8]) -> Self {
        let mut pixels = [[0; TILE_SIZE]; TILE_SIZE];
        for (y, row) in pixels.iter_mut().enumerate() {
            let low = bytes.get(y).copied().unwrap_or(0);
            let high = bytes.get(y + TILE_SIZE).copied().unwrap_or(0);
            for (x, pixel) in row.iter_mut().enumerate() {
                let shift = (7 - x) as u8;
                *pixel = (bit(high, shift) << 1) | bit(low, shift);
            }
        }
        Self { pixels }
    }

    /// Colour index (0-3) at column `x`, row `y`
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y][x]
    }
}

/// Finished picture, one 0x00RRGGBB value per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<u32>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            pixels: vec![PALETTE[0]; SCREEN_WIDTH * SCREEN_HEIGHT],
        }
    }

    pub fn width(&self) -> usize {
        SCREEN_WIDTH
    }

    pub fn height(&self) -> usize {
        SCREEN_HEIGHT
    }

    /// Row-major pixel data
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * SCREEN_WIDTH + x]
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        self.pixels[y * SCREEN_WIDTH + x] = color;
    }

    /// Expand to RGBA bytes with full alpha
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.pixels.len() * 4);
        for &pixel in &self.pixels {
            rgba.extend_from_slice(&[(pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8, 0xFF]);
        }
        rgba
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// PPU internal state
#[derive(Debug, Clone)]
pub struct Ppu {
    /// 16KB PPU address space
    memory: Vec<u8>,
    /// Pattern table tiles, kept in step with $0000-$1FFF
    tiles: Vec<Tile>,
    /// Pattern tables are writable when the cartridge has no CHR ROM
    chr_ram: bool,
    latch: AddressLatch,
    /// PPUDATA read buffer
    buffer: u8,
    // Latched but inert registers
    control: u8,
    mask: u8,
    oam_address: u8,
    oam_data: u8,
    scroll: u8,
    /// Cycles into the current scanline
    cycles: u32,
    /// Current scanline (0-261)
    scanline: u16,
    frame: Frame,
}

impl Ppu {
    /// Create a PPU with `chr_rom` mapped at $0000.
    ///
    /// A cartridge with CHR ROM has read-only pattern tables, so the tiles
    /// decoded here never change. An empty `chr_rom` gives 8KB of CHR RAM
    /// instead; PPUDATA writes into it re-decode the affected tile.
    pub fn new(chr_rom: &[u8]) -> Self {
        let mut memory = vec![0; VRAM_SIZE];
        let len = chr_rom.len().min(NAME_TABLE_BASE as usize);
        memory[..len].copy_from_slice(&chr_rom[..len]);

        let tiles = memory[..NAME_TABLE_BASE as usize]
            .chunks(TILE_BYTES)
            .map(Tile::decode)
            .collect();

        Self {
            memory,
            tiles,
            chr_ram: chr_rom.is_empty(),
            latch: AddressLatch::new(),
            buffer: 0,
            control: 0,
            mask: 0,
            oam_address: 0,
            oam_data: 0,
            scroll: 0,
            cycles: 0,
            scanline: 0,
            frame: Frame::new(),
        }
    }

    /// PPUDATA read. Returns the buffered byte, then refills the buffer from
    /// the latched address and advances the latch.
    pub fn read(&mut self) -> u8 {
        let value = self.buffer;
        self.buffer = self.memory[self.latch.get() as usize];
        self.latch.increment();
        value
    }

    /// PPUADDR write
    pub fn write_address(&mut self, data: u8) {
        self.latch.update(data);
    }

    /// Load a full PPU address, resetting the write toggle
    pub fn set_address(&mut self, address: u16) {
        self.latch.set(address);
    }

    /// PPUDATA write
    pub fn write_data(&mut self, data: u8) {
        let address = self.latch.get();
        self.latch.increment();

        if address >= NAME_TABLE_BASE {
            self.memory[address as usize] = data;
        } else if self.chr_ram {
            self.memory[address as usize] = data;
            let index = address as usize / TILE_BYTES;
            let start = index * TILE_BYTES;
            self.tiles[index] = Tile::decode(&self.memory[start..start + TILE_BYTES]);
        } else {
            log::debug!("PPU write {:#04X} to CHR ROM at {:#06X} ignored", data, address);
        }
    }

    /// Whether the pattern tables are writable
    pub fn has_chr_ram(&self) -> bool {
        self.chr_ram
    }

    /// Dispatch a CPU write to one of the eight register ports
    pub fn write_register(&mut self, register: PpuRegister, data: u8) {
        match register {
            PpuRegister::Address => self.write_address(data),
            PpuRegister::Data => self.write_data(data),
            // Status ignores writes; the rest only latch the value
            inert => {
                match inert {
                    PpuRegister::Control => self.control = data,
                    PpuRegister::Mask => self.mask = data,
                    PpuRegister::OamAddress => self.oam_address = data,
                    PpuRegister::OamData => self.oam_data = data,
                    PpuRegister::Scroll => self.scroll = data,
                    _ => {}
                }
                log::trace!("PPU {:?} <- {:#04X}", inert, data);
            }
        }
    }

    /// Advance by `cycles` PPU cycles. Returns the frame if one completed.
    pub fn run(&mut self, cycles: u32) -> Option<&Frame> {
        self.cycles += cycles;
        let mut completed = false;

        while self.cycles >= CYCLES_PER_SCANLINE {
            self.cycles -= CYCLES_PER_SCANLINE;
            self.scanline += 1;

            if self.scanline <= VISIBLE_SCANLINES && self.scanline % TILE_SIZE as u16 == 0 {
                self.render_tile_row(self.scanline as usize / TILE_SIZE - 1);
            }

            if self.scanline == SCANLINES_PER_FRAME {
                self.scanline = 0;
                completed = true;
                log::debug!("PPU frame complete");
            }
        }

        if completed {
            Some(&self.frame)
        } else {
            None
        }
    }

    /// Draw the 32 background tiles of name table row `row`
    fn render_tile_row(&mut self, row: usize) {
        for column in 0..TILES_PER_ROW {
            let entry = NAME_TABLE_BASE as usize + row * TILES_PER_ROW + column;
            let tile = self
                .tiles
                .get(self.memory[entry] as usize)
                .copied()
                .unwrap_or_default();

            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    let color = PALETTE[tile.pixel(x, y) as usize];
                    self.frame
                        .set_pixel(column * TILE_SIZE + x, row * TILE_SIZE + y, color);
                }
            }
        }
    }

    /// Most recent frame buffer
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Current latched PPU address
    pub fn address(&self) -> u16 {
        self.latch.get()
    }

    /// Current PPUDATA read buffer
    pub fn buffer(&self) -> u8 {
        self.buffer
    }

    /// Get current scanline
    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    /// Cycles accumulated toward the next scanline
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Raw PPU memory
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn tile(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    pub fn control(&self) -> u8 {
        self.control
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn scroll(&self) -> u8 {
        self.scroll
    }

    pub fn oam_address(&self) -> u8 {
        self.oam_address
    }

    pub fn oam_data(&self) -> u8 {
        self.oam_data
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new(&[])
    }
}
