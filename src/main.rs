//! gones - Desktop front-end using egui

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use eframe::egui;
use env_logger::Env;
use gones_core::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};
use gones_core::{Buttons, NesSystem};

/// Keyboard to controller mapping
const KEY_MAP: [(egui::Key, Buttons); 8] = [
    (egui::Key::A, Buttons::A),
    (egui::Key::S, Buttons::B),
    (egui::Key::Space, Buttons::SELECT),
    (egui::Key::Enter, Buttons::START),
    (egui::Key::ArrowUp, Buttons::UP),
    (egui::Key::ArrowDown, Buttons::DOWN),
    (egui::Key::ArrowLeft, Buttons::LEFT),
    (egui::Key::ArrowRight, Buttons::RIGHT),
];

/// NES emulator window
#[derive(Parser, Debug)]
#[command(name = "gones")]
#[command(about = "An NES emulator", long_about = None)]
struct Args {
    /// iNES ROM to load at startup
    rom: Option<PathBuf>,

    /// Window scale factor
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=4))]
    scale: u8,
}

/// App state for the egui application
struct GonesApp {
    system: Option<NesSystem>,
    texture: Option<egui::TextureHandle>,
    scale: f32,
    last_frame_time: Instant,
    fps: f64,
}

impl GonesApp {
    fn new(scale: u8) -> Self {
        Self {
            system: None,
            texture: None,
            scale: scale as f32,
            last_frame_time: Instant::now(),
            fps: 0.0,
        }
    }

    fn load_rom(&mut self, path: &Path) {
        match NesSystem::load(path) {
            Ok(system) => {
                log::info!("Loaded {}", path.display());
                self.system = Some(system);
            }
            Err(e) => log::error!("Failed to load {}: {}", path.display(), e),
        }
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        let Some(system) = self.system.as_mut() else {
            return;
        };

        let controller = system.controller_mut();
        ctx.input(|i| {
            // Release everything while the window is in the background
            if !i.focused {
                controller.set_buttons(Buttons::empty());
                return;
            }
            for (key, button) in KEY_MAP {
                controller.set_pressed(button, i.key_down(key));
            }
        });
    }

    /// Run one frame and upload it as a texture
    fn run_frame(&mut self, ctx: &egui::Context) {
        let Some(system) = self.system.as_mut() else {
            return;
        };

        match system.run_frame() {
            Ok(frame) => {
                let image = egui::ColorImage::from_rgba_unmultiplied(
                    [frame.width(), frame.height()],
                    &frame.to_rgba(),
                );
                match &mut self.texture {
                    Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("nes_frame", image, egui::TextureOptions::NEAREST));
                    }
                }
            }
            Err(e) => {
                log::error!("Emulation stopped: {}", e);
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }
}

impl eframe::App for GonesApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        self.handle_input(ctx);

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f64();
        self.fps = 1.0 / dt.max(0.001);
        self.last_frame_time = now;

        self.run_frame(ctx);

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                if ui.button("Open ROM").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("iNES", &["nes"])
                        .pick_file()
                    {
                        self.load_rom(&path);
                    }
                }

                if let Some(system) = self.system.as_mut() {
                    if ui.button("Reset").clicked() {
                        system.reset();
                    }
                    ui.label(format!("Frames: {}", system.frame_count()));
                }
                ui.label(format!("FPS: {:.1}", self.fps));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match &self.texture {
            Some(texture) if self.system.is_some() => {
                let size = egui::vec2(
                    SCREEN_WIDTH as f32 * self.scale,
                    SCREEN_HEIGHT as f32 * self.scale,
                );
                ui.add(egui::Image::from_texture(texture).fit_to_exact_size(size));
            }
            _ => {
                ui.label("No ROM loaded. Open an .nes file to start.");
            }
        });

        ctx.request_repaint();
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let scale = args.scale as f32;
    let viewport = egui::ViewportBuilder::default().with_inner_size(egui::Vec2::new(
        SCREEN_WIDTH as f32 * scale + 16.0,
        SCREEN_HEIGHT as f32 * scale + 48.0,
    ));

    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    let result = eframe::run_native(
        "gones",
        native_options,
        Box::new(move |_| {
            let mut app = GonesApp::new(args.scale);
            if let Some(path) = &args.rom {
                app.load_rom(path);
            }
            Ok(Box::new(app))
        }),
    );

    if let Err(e) = result {
        log::error!("Failed to run application: {}", e);
        std::process::exit(1);
    }
}
