use std::{path::PathBuf, sync::mpsc};

use crate::gallery::Gallery;
use crate::metadata::PhotoMetadata;

/// Downscale loaded images to this longest-edge size for the preview.
const PREVIEW_MAX: u32 = 1920;

enum BgResult {
    Loaded {
        path: PathBuf,
        rgba: Vec<u8>,
        size: [usize; 2],
    },
    LoadFailed(PathBuf),
}

enum NavAction {
    Previous,
    Next,
    TogglePair,
    Close,
}

/// Modal full-size viewer over a gallery's preview cursor.
pub struct Lightbox {
    id: egui::Id,
    current_path: Option<PathBuf>,
    texture: Option<egui::TextureHandle>,
    loading: bool,
    metadata: Option<PhotoMetadata>,
    tx: mpsc::SyncSender<BgResult>,
    rx: mpsc::Receiver<BgResult>,
}

impl Lightbox {
    pub fn new(id: egui::Id) -> Self {
        let (tx, rx) = mpsc::sync_channel(8);
        Self {
            id,
            current_path: None,
            texture: None,
            loading: false,
            metadata: None,
            tx,
            rx,
        }
    }

    fn set_image(&mut self, path: PathBuf, ctx: &egui::Context) {
        if self.current_path.as_ref() == Some(&path) {
            return;
        }
        self.current_path = Some(path.clone());
        self.texture = None;
        self.loading = true;
        self.metadata = crate::metadata::read(&path).ok();

        let tx = self.tx.clone();
        let ctx2 = ctx.clone();
        std::thread::spawn(move || {
            match crate::thumbnail::open_image(&path) {
                Ok(img) => {
                    let preview = if img.width() > PREVIEW_MAX || img.height() > PREVIEW_MAX {
                        img.thumbnail(PREVIEW_MAX, PREVIEW_MAX)
                    } else {
                        img
                    };
                    let rgba = preview.to_rgba8();
                    let size = [rgba.width() as usize, rgba.height() as usize];
                    let _ = tx.send(BgResult::Loaded {
                        path,
                        rgba: rgba.into_raw(),
                        size,
                    });
                }
                Err(e) => {
                    tracing::warn!("Preview failed for {}: {e}", path.display());
                    let _ = tx.send(BgResult::LoadFailed(path));
                }
            }
            ctx2.request_repaint();
        });
    }

    fn drain(&mut self, ctx: &egui::Context) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                BgResult::Loaded { path, rgba, size } => {
                    if self.current_path.as_ref() == Some(&path) {
                        let img = egui::ColorImage::from_rgba_unmultiplied(size, &rgba);
                        self.texture = Some(ctx.load_texture(
                            "lightbox_tex",
                            img,
                            egui::TextureOptions::LINEAR,
                        ));
                        self.loading = false;
                    }
                }
                BgResult::LoadFailed(path) => {
                    if self.current_path.as_ref() == Some(&path) {
                        self.loading = false;
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        self.current_path = None;
        self.texture = None;
        self.loading = false;
        self.metadata = None;
    }

    /// Shows the modal while the gallery's preview is open. Escape and
    /// backdrop clicks close it; arrow keys navigate.
    pub fn show(&mut self, ctx: &egui::Context, gallery: &mut Gallery) {
        self.drain(ctx);
        let Some(item) = gallery.previewed().cloned() else {
            self.reset();
            return;
        };
        self.set_image(PathBuf::from(&item.image_source), ctx);

        let len = gallery.collection().len();
        let paired = gallery.collection().pairing.is_paired();
        let number = gallery.preview().display_number().unwrap_or_default();
        let has_partner = gallery.preview().has_partner(len);

        let mut action = ctx.input(|i| {
            if i.key_pressed(egui::Key::ArrowLeft) {
                Some(NavAction::Previous)
            } else if i.key_pressed(egui::Key::ArrowRight) {
                Some(NavAction::Next)
            } else {
                None
            }
        });

        let modal = egui::Modal::new(self.id).show(ctx, |ui| {
            let screen = ctx.screen_rect();
            let max = egui::vec2(screen.width() * 0.8, screen.height() * 0.7);
            ui.set_max_width(max.x);

            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(format!("#{number}")).strong().size(16.0));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("✕ Close").clicked() {
                        action = Some(NavAction::Close);
                    }
                });
            });
            ui.separator();

            if self.loading {
                ui.allocate_ui(egui::vec2(max.x.min(400.0), 300.0), |ui| {
                    ui.centered_and_justified(|ui| {
                        ui.spinner();
                    });
                });
            } else if let Some(ref tex) = self.texture {
                let tex_size = tex.size_vec2();
                let scale = (max.x / tex_size.x).min(max.y / tex_size.y).min(1.0);
                let (img_rect, _) =
                    ui.allocate_exact_size(tex_size * scale, egui::Sense::hover());
                ui.painter().image(
                    tex.id(),
                    img_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            } else {
                ui.label("⚠ Could not open image");
            }

            if !item.description.is_empty() {
                ui.label(&item.description);
            }
            if let Some(model) = self.metadata.as_ref().and_then(|m| m.camera_model.as_ref()) {
                ui.label(egui::RichText::new(model).weak());
            }

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui.button("◀ Prev").clicked() {
                    action = Some(NavAction::Previous);
                }
                if paired
                    && ui
                        .add_enabled(has_partner, egui::Button::new("⇄ Other side"))
                        .clicked()
                {
                    action = Some(NavAction::TogglePair);
                }
                if ui.button("Next ▶").clicked() {
                    action = Some(NavAction::Next);
                }
            });
        });

        if modal.should_close() {
            action = Some(NavAction::Close);
        }
        let preview = gallery.preview_mut();
        match action {
            Some(NavAction::Previous) => preview.previous(len),
            Some(NavAction::Next) => preview.next(len),
            Some(NavAction::TogglePair) => preview.toggle_pair(len),
            Some(NavAction::Close) => preview.close(),
            None => {}
        }
    }
}
