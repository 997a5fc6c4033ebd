mod decode;
mod render;
mod volume;
mod zoom;

use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, Sender, channel},
    thread,
};

use clap::Parser;
use eframe::egui::{self, Color32, Rect, Sense, Slider, TextureHandle, TextureOptions, pos2, vec2};
use log::{debug, info, warn};

use crate::{
    render::{SURFACE_SIZE, Surface},
    volume::Volume,
    zoom::ZoomSelector,
};

#[derive(Parser, Debug)]
struct Args {
    /// Path to a NIfTI-1 volume (.nii or .nii.gz) to open at startup.
    nii_path: Option<PathBuf>,
}

/// Sent by a load worker once a file has been read and decoded.
struct LoadedVolume {
    generation: u64,
    source_path: PathBuf,
    volume: Volume,
}

struct LoadedState {
    source_path: PathBuf,
    volume: Volume,
    slice_index: usize,
}

struct ViewerApp {
    loaded: Option<LoadedState>,
    zoom: ZoomSelector,
    surface: Surface,
    texture: Option<TextureHandle>,
    generation: u64,
    tx: Sender<LoadedVolume>,
    rx: Receiver<LoadedVolume>,
}

impl Default for ViewerApp {
    fn default() -> Self {
        let (tx, rx) = channel();
        Self {
            loaded: None,
            zoom: ZoomSelector::default(),
            surface: Surface::new(),
            texture: None,
            generation: 0,
            tx,
            rx,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    let args = Args::parse();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([560.0, 700.0]),
        ..Default::default()
    };

    eframe::run_native(
        "NIfTI viewer",
        options,
        Box::new(|cc| {
            let mut app = ViewerApp::default();
            if let Some(path) = args.nii_path {
                app.open_file(path, &cc.egui_ctx);
            }
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_messages(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            if ui.button("Load...").clicked()
                && let Some(path) = rfd::FileDialog::new().pick_file()
            {
                self.open_file(path, ctx);
            }

            if let Some(loaded) = &self.loaded {
                let header = &loaded.volume.header;
                ui.label("Input path: ");
                ui.monospace(loaded.source_path.to_string_lossy());
                ui.label(format!(
                    "Input size: {}x{}x{}",
                    header.slices(),
                    header.rows(),
                    header.cols()
                ));
            }

            self.canvas(ui, ctx);
            self.slice_slider(ui, ctx);

            let zoom_label = if self.zoom.is_enabled() {
                "Disable Zoom"
            } else {
                "Enable Zoom"
            };
            if ui.button(zoom_label).clicked() {
                self.zoom.toggle();
                self.redraw(ctx);
            }
        });
    }
}

impl ViewerApp {
    /// Kick off a background read + decode. Completions carry a generation
    /// stamp so a slow decode of an earlier pick cannot overwrite a later
    /// one.
    fn open_file(&mut self, path: PathBuf, ctx: &egui::Context) {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            if let Some(volume) = load_volume(&path) {
                let _ = tx.send(LoadedVolume {
                    generation,
                    source_path: path,
                    volume,
                });
                ctx.request_repaint();
            }
        });
    }

    fn handle_messages(&mut self, ctx: &egui::Context) {
        while let Ok(message) = self.rx.try_recv() {
            if message.generation != self.generation {
                debug!("dropping stale load of {:?}", message.source_path);
                continue;
            }
            let slice_index = message.volume.header.middle_slice();
            self.loaded = Some(LoadedState {
                source_path: message.source_path,
                volume: message.volume,
                slice_index,
            });
            self.zoom.reset();
            self.redraw(ctx);
        }
    }

    /// Recompute the whole surface from current state and upload it. Safe to
    /// call redundantly; identical state produces identical pixels.
    fn redraw(&mut self, ctx: &egui::Context) {
        let Some(loaded) = &self.loaded else { return };
        let grid = match loaded.volume.slice(loaded.slice_index) {
            Ok(grid) => grid,
            Err(err) => {
                warn!("cannot render: {err}");
                return;
            }
        };

        let header = &loaded.volume.header;
        render::render_slice(&mut self.surface, header.cols(), header.rows(), |row, col| {
            render::map_pixel(grid.value_at(row, col))
        });
        if let Some(rect) = self.zoom.committed()
            && let Some(crop) = rect.normalized(SURFACE_SIZE)
        {
            render::magnify(&mut self.surface, crop);
        }

        let image = self.surface.to_color_image();
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::NEAREST),
            None => {
                self.texture = Some(ctx.load_texture("slice", image, TextureOptions::NEAREST));
            }
        }
    }

    fn slice_slider(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let mut changed = false;
        match &mut self.loaded {
            Some(loaded) => {
                let max = loaded.volume.header.slices().saturating_sub(1);
                changed = ui
                    .add(Slider::new(&mut loaded.slice_index, 0..=max))
                    .changed();
            }
            None => {
                // placeholder range until a volume is loaded
                let mut unused = 0;
                ui.add_enabled(false, Slider::new(&mut unused, 0..=100));
            }
        }
        if changed {
            self.redraw(ctx);
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let size = vec2(SURFACE_SIZE as f32, SURFACE_SIZE as f32);
        let (rect, response) = ui.allocate_exact_size(size, Sense::drag());

        ui.painter().rect_filled(rect, 0.0, Color32::BLACK);
        if let Some(texture) = &self.texture {
            ui.painter().image(
                texture.id(),
                rect,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        // pointer events feed the zoom machine only while zoom mode is on
        if !self.zoom.is_enabled() {
            return;
        }
        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = pos - rect.min;
                self.zoom.pointer_down(local.x, local.y);
                self.redraw(ctx);
            }
        } else if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = pos - rect.min;
                self.zoom.pointer_move(local.x, local.y);
                self.redraw(ctx);
            }
        } else if response.drag_stopped() {
            self.zoom.pointer_up();
            self.redraw(ctx);
        }
    }
}

/// Full decode pipeline for one file. Every failure degrades to "no volume":
/// the viewer keeps showing whatever it had.
fn load_volume(path: &Path) -> Option<Volume> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("cannot read {path:?}: {err}");
            return None;
        }
    };

    let bytes = if decode::is_compressed(&bytes) {
        match decode::decompress(&bytes) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("cannot decompress {path:?}: {err}");
                return None;
            }
        }
    } else {
        bytes
    };

    if !decode::is_nifti(&bytes) {
        debug!("ignoring non-NIfTI input {path:?}");
        return None;
    }

    match decode::read_volume(&bytes) {
        Ok(volume) => {
            info!(
                "loaded {path:?}: {}x{}x{}",
                volume.header.slices(),
                volume.header.rows(),
                volume.header.cols()
            );
            Some(volume)
        }
        Err(err) => {
            warn!("cannot decode {path:?}: {err}");
            None
        }
    }
}
