//! gones CLI - headless runner for the NES emulator core

use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Env;
use gones_core::NesSystem;

/// Headless NES runner
#[derive(Parser, Debug)]
#[command(name = "gones-cli")]
#[command(about = "Run an NES cartridge without a window", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Number of frames to run
    #[arg(short, long, default_value = "60")]
    frames: u64,

    /// Dump CPU state after execution
    #[arg(short = 'c', long)]
    dump_cpu: bool,

    /// Dump PPU state after execution
    #[arg(short = 'p', long)]
    dump_ppu: bool,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut system = match NesSystem::load(&args.rom) {
        Ok(system) => system,
        Err(e) => {
            log::error!("Failed to load {}: {}", args.rom.display(), e);
            process::exit(1);
        }
    };

    let cartridge = system.cpu().bus().cartridge();
    println!("Loaded cartridge:");
    println!("  PRG ROM: {} bytes", cartridge.prg_rom().len());
    println!("  CHR ROM: {} bytes", cartridge.chr_rom().len());

    println!("\nRunning {} frames...", args.frames);
    let result = system.run_frames(args.frames);
    println!("Completed {} frames.", system.frame_count());

    if args.dump_cpu {
        dump_cpu_state(&system);
    }

    if args.dump_ppu {
        dump_ppu_state(&system);
    }

    if let Err(e) = result {
        log::error!("Emulation stopped: {}", e);
        process::exit(1);
    }
}

fn dump_cpu_state(system: &NesSystem) {
    let regs = system.cpu().registers();

    println!("\nCPU State:");
    println!("  A:    ${:02X}", regs.a);
    println!("  X:    ${:02X}", regs.x);
    println!("  Y:    ${:02X}", regs.y);
    println!("  PC:   ${:04X}", regs.pc);
    println!("  SP:   ${:02X}", regs.sp);
    println!("  P:    ${:02X} ({})", regs.status.bits(), regs.status);
    println!("  Cycles: {}", system.total_cycles());
}

fn dump_ppu_state(system: &NesSystem) {
    let ppu = system.ppu();

    println!("\nPPU State:");
    println!("  Scanline: {}", ppu.scanline());
    println!("  Cycle:    {}", ppu.cycles());
    println!("  Address:  ${:04X}", ppu.address());
    println!("  Buffer:   ${:02X}", ppu.buffer());
    println!("  Control:  ${:02X}", ppu.control());
    println!("  Mask:     ${:02X}", ppu.mask());
}
