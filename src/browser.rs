use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::mpsc,
    time::Instant,
};

use egui::{Color32, Stroke, StrokeKind};

use crate::gallery::{Gallery, Item, Selection, display_number, unit_len};
use crate::viewer::Lightbox;

const CELL: f32 = 150.0;
const SPACING: f32 = 10.0;
/// How far the back photo of a stacked pair peeks out.
const STACK_OFFSET: f32 = 10.0;
const HIGHLIGHT_WIDTH: f32 = 4.0;

enum ThumbState {
    Loading,
    Ready(egui::TextureHandle),
    Failed,
}

struct ThumbResult {
    path: PathBuf,
    rgba: Option<(Vec<u8>, usize, usize)>,
}

/// Thumbnail textures, generated on background threads and shared by every
/// gallery on screen.
pub struct Thumbnails {
    cache_dir: PathBuf,
    states: HashMap<PathBuf, ThumbState>,
    tx: mpsc::SyncSender<ThumbResult>,
    rx: mpsc::Receiver<ThumbResult>,
}

impl Thumbnails {
    pub fn new(cache_dir: PathBuf) -> Self {
        let (tx, rx) = mpsc::sync_channel(64);
        Self {
            cache_dir,
            states: HashMap::new(),
            tx,
            rx,
        }
    }

    pub fn poll(&mut self, ctx: &egui::Context) {
        while let Ok(ThumbResult { path, rgba }) = self.rx.try_recv() {
            let state = match rgba {
                Some((data, w, h)) => {
                    let img = egui::ColorImage::from_rgba_unmultiplied([w, h], &data);
                    let tex = ctx.load_texture(
                        path.to_string_lossy().as_ref(),
                        img,
                        egui::TextureOptions::LINEAR,
                    );
                    ThumbState::Ready(tex)
                }
                None => ThumbState::Failed,
            };
            self.states.insert(path, state);
        }
    }

    /// The texture for `source`, queueing generation on first request.
    fn texture(&mut self, ctx: &egui::Context, source: &str) -> Option<(egui::TextureId, egui::Vec2)> {
        let path = PathBuf::from(source);
        match self.states.get(&path) {
            Some(ThumbState::Ready(tex)) => Some((tex.id(), tex.size_vec2())),
            Some(ThumbState::Loading | ThumbState::Failed) => None,
            None => {
                self.states.insert(path.clone(), ThumbState::Loading);
                let tx = self.tx.clone();
                let ctx2 = ctx.clone();
                let cache_dir = self.cache_dir.clone();
                std::thread::spawn(move || {
                    let rgba = generate_thumb(&path, &cache_dir);
                    let _ = tx.send(ThumbResult { path, rgba });
                    ctx2.request_repaint();
                });
                None
            }
        }
    }

    fn failed(&self, source: &str) -> bool {
        matches!(self.states.get(Path::new(source)), Some(ThumbState::Failed))
    }

    /// A square, non-interactive thumbnail.
    pub fn show(&mut self, ui: &mut egui::Ui, source: &str, size: f32) {
        let (rect, _) = ui.allocate_exact_size(egui::vec2(size, size), egui::Sense::hover());
        let thumb = self.texture(ui.ctx(), source);
        paint_photo(ui.painter(), rect, thumb, self.failed(source));
    }
}

fn generate_thumb(path: &Path, cache_dir: &Path) -> Option<(Vec<u8>, usize, usize)> {
    let img = match crate::thumbnail::load_or_generate(path, cache_dir) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!("Thumbnail failed for {}: {e}", path.display());
            return None;
        }
    };
    let rgba = img.to_rgba8();
    let w = rgba.width() as usize;
    let h = rgba.height() as usize;
    Some((rgba.into_raw(), w, h))
}

/// Tile grid plus lightbox for one [`Gallery`].
///
/// Turns egui pointer state into the gallery's pointer events: press and
/// release on a tile, leaving a pressed tile, and clicks on empty space.
pub struct GalleryView {
    title: String,
    gallery: Gallery,
    pressed: Option<usize>,
    lightbox: Lightbox,
}

impl GalleryView {
    pub fn new(id_salt: impl std::hash::Hash, title: impl Into<String>, gallery: Gallery) -> Self {
        let id = egui::Id::new(id_salt);
        Self {
            title: title.into(),
            gallery,
            pressed: None,
            lightbox: Lightbox::new(id.with("lightbox")),
        }
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn set_items(&mut self, items: Vec<Item>) {
        self.pressed = None;
        self.gallery.set_items(items);
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        selection: &mut Selection,
        thumbs: &mut Thumbnails,
        highlight: Color32,
    ) {
        let now = Instant::now();
        self.gallery.poll(now, selection);
        if !ui.input(|i| i.focused) {
            if let Some(index) = self.pressed.take() {
                self.gallery.pointer_cancel(index);
            }
        }

        let top_left = ui.cursor().min;
        let header = ui.horizontal(|ui| {
            ui.heading(&self.title);
            let collection = self.gallery.collection();
            ui.label(
                egui::RichText::new(format!(
                    "{} photos",
                    unit_len(collection.pairing, collection.len())
                ))
                .weak(),
            );
            if selection.is_selecting() {
                let selected = self
                    .gallery
                    .collection()
                    .items
                    .iter()
                    .filter(|item| selection.contains(&item.id))
                    .count();
                ui.label(format!("Selected: {selected}"));
                let select_all = ui.small_button("Select all");
                if select_all.clicked() {
                    self.gallery.select_all(selection);
                }
                return select_all.contains_pointer();
            }
            false
        });

        let tiles: Vec<(usize, Item, Option<Item>)> = {
            let collection = self.gallery.collection();
            collection
                .tile_positions()
                .map(|index| {
                    (
                        index,
                        collection.items[index].clone(),
                        collection.partner_of(index).cloned(),
                    )
                })
                .collect()
        };
        let pairing = self.gallery.collection().pairing;

        let inner = ui.horizontal_wrapped(|ui| {
            ui.spacing_mut().item_spacing = egui::vec2(SPACING, SPACING);
            if tiles.is_empty() {
                ui.label(egui::RichText::new("Nothing here yet").weak());
                return false;
            }
            let mut tile_hit = false;
            for (index, item, partner) in &tiles {
                let (resp, painter) =
                    ui.allocate_painter(egui::vec2(CELL, CELL), egui::Sense::click());
                tile_hit |= resp.contains_pointer();
                self.route_pointer(*index, &resp, now, selection);
                if resp.has_focus()
                    && ui.input(|i| i.key_pressed(egui::Key::Enter) || i.key_pressed(egui::Key::Space))
                {
                    self.gallery.activate(*index, selection);
                }

                let front = thumbs.texture(ui.ctx(), &item.image_source);
                let back = partner
                    .as_ref()
                    .map(|p| (thumbs.texture(ui.ctx(), &p.image_source), thumbs.failed(&p.image_source)));
                let tile = Tile {
                    number: display_number(pairing, *index),
                    front,
                    front_failed: thumbs.failed(&item.image_source),
                    back,
                    selected: selection.contains(&item.id),
                    hovered: resp.hovered(),
                    highlight,
                };
                tile.paint(ui, &painter, resp.rect);
                if !item.description.is_empty() {
                    resp.on_hover_text(&item.description);
                }
            }
            tile_hit
        });

        // Anywhere in the gallery block is background except tiles and its button.
        let hit = inner.inner || header.inner;
        let area = egui::Rect::from_min_max(
            top_left,
            egui::pos2(ui.max_rect().right(), inner.response.rect.bottom()),
        );
        let clicked_background = !hit
            && ui.input(|i| i.pointer.primary_clicked())
            && ui.ctx().rect_contains_pointer(ui.layer_id(), area);
        if clicked_background && !self.gallery.preview().is_open() {
            self.gallery.background_click(selection);
        }

        if let Some(wait) = self.gallery.next_deadline(Instant::now()) {
            ui.ctx().request_repaint_after(wait);
        }

        self.lightbox.show(ui.ctx(), &mut self.gallery);
    }

    fn route_pointer(
        &mut self,
        index: usize,
        resp: &egui::Response,
        now: Instant,
        selection: &mut Selection,
    ) {
        let down = resp.is_pointer_button_down_on();
        match self.pressed {
            Some(pressed) if pressed == index => {
                if !resp.contains_pointer() {
                    self.gallery.pointer_leave(index);
                    self.pressed = None;
                } else if !down {
                    self.gallery.pointer_up(index, now, selection);
                    self.pressed = None;
                }
            }
            _ if down => {
                self.gallery.pointer_down(index, now);
                self.pressed = Some(index);
            }
            _ => {}
        }
    }
}

struct Tile {
    number: usize,
    front: Option<(egui::TextureId, egui::Vec2)>,
    front_failed: bool,
    /// Partner photo of a stacked pair and whether its thumbnail failed.
    back: Option<(Option<(egui::TextureId, egui::Vec2)>, bool)>,
    selected: bool,
    hovered: bool,
    highlight: Color32,
}

impl Tile {
    fn paint(&self, ui: &egui::Ui, painter: &egui::Painter, rect: egui::Rect) {
        let front_rect = match self.back {
            Some((back, back_failed)) => {
                let size = egui::vec2(CELL - STACK_OFFSET, CELL - STACK_OFFSET);
                let back_rect =
                    egui::Rect::from_min_size(rect.min + egui::vec2(STACK_OFFSET, 0.0), size);
                paint_photo(painter, back_rect, back, back_failed);
                painter.rect_filled(back_rect, 4.0, Color32::from_black_alpha(90));
                egui::Rect::from_min_size(rect.min + egui::vec2(0.0, STACK_OFFSET), size)
            }
            None => rect,
        };
        paint_photo(painter, front_rect, self.front, self.front_failed);

        if self.selected {
            painter.rect_stroke(
                front_rect,
                4.0,
                Stroke::new(HIGHLIGHT_WIDTH, self.highlight),
                StrokeKind::Inside,
            );
        } else if self.hovered {
            painter.rect_stroke(
                front_rect,
                4.0,
                ui.visuals().widgets.hovered.bg_stroke,
                StrokeKind::Inside,
            );
        }

        let badge = front_rect.left_top() + egui::vec2(16.0, 16.0);
        painter.circle_filled(badge, 11.0, Color32::from_black_alpha(160));
        painter.text(
            badge,
            egui::Align2::CENTER_CENTER,
            self.number.to_string(),
            egui::FontId::proportional(12.0),
            Color32::WHITE,
        );
    }
}

fn paint_photo(
    painter: &egui::Painter,
    rect: egui::Rect,
    thumb: Option<(egui::TextureId, egui::Vec2)>,
    failed: bool,
) {
    painter.rect_filled(rect, 4.0, Color32::from_gray(40));
    match thumb {
        Some((tex_id, tex_size)) => {
            let scale = (rect.width() / tex_size.x).min(rect.height() / tex_size.y);
            let display = tex_size * scale;
            let draw_rect = egui::Rect::from_center_size(rect.center(), display);
            painter.image(
                tex_id,
                draw_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        None => {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                if failed { "!" } else { "…" },
                egui::FontId::proportional(22.0),
                Color32::GRAY,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::{Collection, InteractionMode, Pairing, gesture::DEFAULT_THRESHOLD};

    fn input(events: Vec<egui::Event>) -> egui::RawInput {
        egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(800.0, 600.0),
            )),
            events,
            ..Default::default()
        }
    }

    fn click(pos: egui::Pos2) -> Vec<egui::Event> {
        let button = |pressed| egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed,
            modifiers: egui::Modifiers::NONE,
        };
        vec![egui::Event::PointerMoved(pos), button(true), button(false)]
    }

    fn run_frames(pos: egui::Pos2) -> Selection {
        let dir = tempfile::tempdir().unwrap();
        let mut thumbs = Thumbnails::new(dir.path().to_path_buf());
        let mut view = GalleryView::new(
            "letters",
            "Letters",
            Gallery::new(Collection::new(Pairing::Single, Vec::new()), DEFAULT_THRESHOLD),
        );
        let mut selection = Selection::default();
        selection.set_mode(InteractionMode::Selecting);

        let ctx = egui::Context::default();
        for events in [Vec::new(), click(pos)] {
            let _ = ctx.run(input(events), |ctx| {
                egui::CentralPanel::default().show(ctx, |ui| {
                    view.show(ui, &mut selection, &mut thumbs, Color32::RED);
                });
            });
        }
        selection
    }

    #[test]
    fn click_beside_the_heading_clears_the_selection() {
        let selection = run_frames(egui::pos2(600.0, 18.0));
        assert_eq!(selection.mode(), InteractionMode::Browsing);
    }

    #[test]
    fn click_outside_the_gallery_keeps_the_selection() {
        let selection = run_frames(egui::pos2(600.0, 550.0));
        assert_eq!(selection.mode(), InteractionMode::Selecting);
    }
}
