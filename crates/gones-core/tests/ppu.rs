//! PPU tests for the NES emulator

use gones_core::ppu::{
    AddressLatch, PpuRegister, CYCLES_PER_SCANLINE, PALETTE, SCANLINES_PER_FRAME,
};
use gones_core::Ppu;

/// CHR with tile 1 solid colour 3 and tile 2 solid colour 1
fn chr() -> Vec<u8> {
    let mut chr = vec![0u8; 0x2000];
    chr[16..32].fill(0xFF);
    chr[32..40].fill(0xFF);
    chr
}

#[test]
fn test_address_latch_pairs() {
    let mut latch = AddressLatch::new();
    latch.update(0x3F);
    latch.update(0x10);
    assert_eq!(latch.get(), 0x3F10);

    // A third write starts a new pair with the high byte
    latch.update(0x23);
    assert_eq!(latch.get(), 0x2310);
    latch.update(0x45);
    assert_eq!(latch.get(), 0x2345);
}

#[test]
fn test_address_port_pairs() {
    let mut ppu = Ppu::default();
    ppu.write_register(PpuRegister::Address, 0x3F);
    ppu.write_register(PpuRegister::Address, 0x10);
    assert_eq!(ppu.address(), 0x3F10);
    ppu.write_register(PpuRegister::Address, 0x20);
    ppu.write_register(PpuRegister::Address, 0x00);
    assert_eq!(ppu.address(), 0x2000);
}

#[test]
fn test_buffered_read() {
    let mut ppu = Ppu::default();
    ppu.set_address(0x2345);
    ppu.write_data(0xAB);
    ppu.write_data(0xCD);

    ppu.set_address(0x2345);
    assert_eq!(ppu.buffer(), 0x00);
    // First read returns the stale buffer, then loads $2345
    assert_eq!(ppu.read(), 0x00);
    assert_eq!(ppu.buffer(), 0xAB);
    assert_eq!(ppu.address(), 0x2346);
    assert_eq!(ppu.read(), 0xAB);
    assert_eq!(ppu.read(), 0xCD);
}

#[test]
fn test_write_data_increments() {
    let mut ppu = Ppu::default();
    ppu.set_address(0x3FFF);
    ppu.write_data(0x01);
    assert_eq!(ppu.address(), 0x0000);
    assert_eq!(ppu.memory()[0x3FFF], 0x01);
}

#[test]
fn test_chr_mapped_at_zero() {
    let mut ppu = Ppu::new(&chr());
    ppu.set_address(0x0010);
    ppu.read();
    assert_eq!(ppu.read(), 0xFF);
}

#[test]
fn test_frame_after_262_scanlines() {
    let mut ppu = Ppu::default();
    for _ in 0..SCANLINES_PER_FRAME - 1 {
        assert!(ppu.run(CYCLES_PER_SCANLINE).is_none());
    }
    assert_eq!(ppu.scanline(), 261);
    assert!(ppu.run(CYCLES_PER_SCANLINE).is_some());
    assert_eq!(ppu.scanline(), 0);

    // Small steps reach the same point
    let mut completed = 0;
    for _ in 0..(CYCLES_PER_SCANLINE * SCANLINES_PER_FRAME as u32 / 3) {
        if ppu.run(3).is_some() {
            completed += 1;
        }
    }
    assert_eq!(completed, 0);
    assert!(ppu.run(CYCLES_PER_SCANLINE).is_some());
}

#[test]
fn test_tile_row_rendering() {
    let mut ppu = Ppu::new(&chr());
    // Row 0: tile 1 at column 0, tile 2 at column 31. Row 1: tile 1 at column 0.
    ppu.set_address(0x2000);
    ppu.write_data(0x01);
    ppu.set_address(0x201F);
    ppu.write_data(0x02);
    ppu.write_data(0x01);

    ppu.run(CYCLES_PER_SCANLINE * 7);
    assert_eq!(ppu.frame().pixel(0, 0), PALETTE[0]);

    ppu.run(CYCLES_PER_SCANLINE);
    let frame = ppu.frame();
    assert_eq!(frame.pixel(0, 0), 0xFFFFFF);
    assert_eq!(frame.pixel(7, 7), 0xFFFFFF);
    assert_eq!(frame.pixel(8, 0), 0x000000);
    assert_eq!(frame.pixel(248, 0), 0x545454);
    assert_eq!(frame.pixel(255, 7), 0x545454);
    assert_eq!(frame.pixel(0, 8), 0x000000);

    ppu.run(CYCLES_PER_SCANLINE * 8);
    assert_eq!(ppu.frame().pixel(0, 8), 0xFFFFFF);
}

#[test]
fn test_all_rows_rendered_in_frame() {
    let mut ppu = Ppu::new(&chr());
    ppu.set_address(0x2000);
    for _ in 0..32 * 30 {
        ppu.write_data(0x01);
    }

    let frame = ppu
        .run(CYCLES_PER_SCANLINE * SCANLINES_PER_FRAME as u32)
        .cloned()
        .unwrap();
    assert!(frame.pixels().iter().all(|&p| p == 0xFFFFFF));
}
