use std::{collections::HashMap, path::Path, path::PathBuf, sync::mpsc};

use crate::thumbnail::{THUMB_SIZE, is_supported_image, thumbnail_dimensions};

const CELL: f32 = 120.0;

enum ThumbState {
    Loading,
    Ready(egui::TextureHandle),
    Failed,
}

struct ThumbResult {
    path: PathBuf,
    rgba: Option<(Vec<u8>, usize, usize)>,
}

/// Directory browser used to pick the source image.
pub struct Browser {
    pub current_dir: PathBuf,
    subdirs: Vec<(PathBuf, String)>,
    images: Vec<(PathBuf, String)>,
    pending_nav: Option<PathBuf>,
    thumbnails: HashMap<PathBuf, ThumbState>,
    tx: mpsc::SyncSender<ThumbResult>,
    rx: mpsc::Receiver<ThumbResult>,
    picked: Option<PathBuf>,
}

impl Browser {
    pub fn new(start_dir: Option<PathBuf>) -> Self {
        let (tx, rx) = mpsc::sync_channel(64);
        let current_dir = start_dir
            .filter(|p| p.is_dir())
            .or_else(dirs::picture_dir)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("/"));
        let mut b = Self {
            current_dir,
            subdirs: Vec::new(),
            images: Vec::new(),
            pending_nav: None,
            thumbnails: HashMap::new(),
            tx,
            rx,
            picked: None,
        };
        b.scan();
        b
    }

    /// The image clicked since the last call, if any.
    pub fn take_picked(&mut self) -> Option<PathBuf> {
        self.picked.take()
    }

    fn scan(&mut self) {
        self.subdirs.clear();
        self.images.clear();
        self.thumbnails.clear();

        let Ok(rd) = std::fs::read_dir(&self.current_dir) else {
            return;
        };

        for entry in rd.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if path.is_dir() {
                self.subdirs.push((path, name));
            } else if is_supported_image(&path) {
                self.images.push((path, name));
            }
        }

        self.subdirs.sort_by(|a, b| a.1.cmp(&b.1));
        self.images.sort_by(|a, b| a.1.cmp(&b.1));
    }

    fn queue_pending_thumbs(&mut self, ctx: &egui::Context) {
        let to_queue: Vec<PathBuf> = self
            .images
            .iter()
            .filter(|(p, _)| !self.thumbnails.contains_key(p))
            .map(|(p, _)| p.clone())
            .collect();

        for path in to_queue {
            self.thumbnails.insert(path.clone(), ThumbState::Loading);
            let tx = self.tx.clone();
            let ctx2 = ctx.clone();
            std::thread::spawn(move || {
                let rgba = preview_rgba(&path);
                let _ = tx.send(ThumbResult { path, rgba });
                ctx2.request_repaint();
            });
        }
    }

    /// Drain finished thumbnails. Call once per frame.
    pub fn poll(&mut self, ctx: &egui::Context) {
        if let Some(nav) = self.pending_nav.take() {
            self.current_dir = nav;
            self.scan();
        }

        while let Ok(ThumbResult { path, rgba }) = self.rx.try_recv() {
            // Results from a directory we already left.
            if !self.thumbnails.contains_key(&path) {
                continue;
            }
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
            self.thumbnails.insert(path, state);
        }
    }

    pub fn show_contents(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        self.queue_pending_thumbs(ctx);

        let mut nav_to: Option<PathBuf> = None;
        let mut picked: Option<PathBuf> = None;

        ui.horizontal(|ui| {
            if ui.button("⬆").on_hover_text("Parent directory").clicked() {
                if let Some(p) = self.current_dir.parent() {
                    nav_to = Some(p.to_path_buf());
                }
            }
            ui.monospace(self.current_dir.display().to_string());
        });
        ui.separator();

        if !self.subdirs.is_empty() {
            ui.horizontal_wrapped(|ui| {
                for (path, name) in &self.subdirs {
                    if ui.button(format!("📁 {}", name)).clicked() {
                        nav_to = Some(path.clone());
                    }
                }
            });
            ui.separator();
        }

        if self.images.is_empty() {
            ui.label(egui::RichText::new("No images in this directory").weak());
        } else {
            let avail_w = ui.available_width();
            let cols = ((avail_w / (CELL + 8.0)) as usize).max(1);

            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    egui::Grid::new("image_grid")
                        .num_columns(cols)
                        .spacing([8.0, 8.0])
                        .show(ui, |ui| {
                            for (i, (path, name)) in self.images.iter().enumerate() {
                                let thumb = match self.thumbnails.get(path) {
                                    Some(ThumbState::Ready(tex)) => {
                                        Some((tex.id(), tex.size_vec2()))
                                    }
                                    Some(ThumbState::Failed) => {
                                        // Unreadable files stay listed but cannot be picked.
                                        draw_thumb_cell(ui, name, None, false);
                                        if (i + 1) % cols == 0 {
                                            ui.end_row();
                                        }
                                        continue;
                                    }
                                    _ => None,
                                };

                                if draw_thumb_cell(ui, name, thumb, true) {
                                    picked = Some(path.clone());
                                }

                                if (i + 1) % cols == 0 {
                                    ui.end_row();
                                }
                            }
                        });
                });
        }

        if let Some(nav) = nav_to {
            self.pending_nav = Some(nav);
        }
        if let Some(path) = picked {
            self.picked = Some(path);
        }
    }
}

fn draw_thumb_cell(
    ui: &mut egui::Ui,
    name: &str,
    thumb: Option<(egui::TextureId, egui::Vec2)>,
    pickable: bool,
) -> bool {
    let sense = if pickable {
        egui::Sense::click()
    } else {
        egui::Sense::hover()
    };
    let (resp, painter) = ui.allocate_painter(egui::vec2(CELL, CELL + 22.0), sense);
    let rect = resp.rect;

    if pickable && resp.hovered() {
        painter.rect_filled(rect, 4.0, ui.visuals().widgets.hovered.bg_fill);
    }

    let img_rect = egui::Rect::from_min_size(rect.min, egui::vec2(CELL, CELL));
    match thumb {
        Some((tex_id, tex_size)) => {
            let scale = (CELL / tex_size.x).min(CELL / tex_size.y);
            let display = tex_size * scale;
            let offset = (egui::vec2(CELL, CELL) - display) * 0.5;
            let draw_rect = egui::Rect::from_min_size(img_rect.min + offset, display);
            painter.image(
                tex_id,
                draw_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        None => {
            painter.rect_filled(img_rect, 4.0, egui::Color32::from_gray(40));
            painter.text(
                img_rect.center(),
                egui::Align2::CENTER_CENTER,
                if pickable { "…" } else { "⚠" },
                egui::FontId::proportional(22.0),
                egui::Color32::GRAY,
            );
        }
    }

    let label_pos = egui::pos2(rect.center().x, img_rect.max.y + 11.0);
    painter.text(
        label_pos,
        egui::Align2::CENTER_CENTER,
        short_name(name, 18),
        egui::FontId::proportional(11.0),
        ui.visuals().text_color(),
    );

    resp.clicked()
}

/// Truncate on a char boundary, appending an ellipsis when shortened.
pub fn short_name(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    let mut out: String = name.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn preview_rgba(path: &Path) -> Option<(Vec<u8>, usize, usize)> {
    let full = image::open(path).ok()?;
    let (w, h) = thumbnail_dimensions(full.width(), full.height(), THUMB_SIZE);
    let rgba = full
        .resize_exact(w, h, image::imageops::FilterType::Triangle)
        .to_rgba8();
    let (w, h) = (rgba.width() as usize, rgba.height() as usize);
    Some((rgba.into_raw(), w, h))
}

#[cfg(test)]
mod tests {
    use super::short_name;

    #[test]
    fn short_name_keeps_short_names() {
        assert_eq!(short_name("cat.png", 18), "cat.png");
    }

    #[test]
    fn short_name_truncates_on_char_boundaries() {
        assert_eq!(short_name("ééééééééé.png", 5), "éééé…");
    }
}
