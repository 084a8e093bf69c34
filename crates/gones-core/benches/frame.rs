use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gones_core::{Cartridge, NesSystem};

/// Fills the first name table through the PPU ports, then loops forever
fn demo_cartridge() -> Cartridge {
    #[rustfmt::skip]
    let program = [
        0xA9, 0x20,       // LDA #$20
        0x8D, 0x06, 0x20, // STA $2006
        0xA9, 0x00,       // LDA #$00
        0x8D, 0x06, 0x20, // STA $2006
        0xA2, 0x00,       // LDX #$00
        0x8A,             // loop: TXA
        0x29, 0x03,       // AND #$03
        0x8D, 0x07, 0x20, // STA $2007
        0xE8,             // INX
        0xD0, 0xF7,       // BNE loop
        0x4C, 0x15, 0x80, // JMP *
    ];

    let mut prg = vec![0xEA; 0x4000];
    prg[..program.len()].copy_from_slice(&program);
    prg[0x3FFC] = 0x00;
    prg[0x3FFD] = 0x80;

    let chr: Vec<u8> = (0..0x2000).map(|i| (i * 7) as u8).collect();
    Cartridge::new(prg, chr)
}

fn bench_frame(c: &mut Criterion) {
    let mut system = NesSystem::new(demo_cartridge());
    c.bench_function("run_frame", |b| {
        b.iter(|| {
            let frame = system.run_frame().map(|f| f.pixel(0, 0));
            black_box(frame).ok();
        })
    });
}

criterion_group!(benches, bench_frame);
criterion_main!(benches);
