use std::collections::HashMap;

use crate::browser::short_name;
use crate::codec::ImageHandle;
use crate::history::{HistoryEntry, Provenance};

/// Cap on the texture uploaded for the main view.
const PREVIEW_MAX: u32 = 1920;
const STRIP_CELL: f32 = 80.0;

/// GPU textures for the current image and the history strip.
pub struct Viewer {
    current: Option<(u64, egui::TextureHandle)>,
    thumbs: HashMap<u64, egui::TextureHandle>,
}

impl Viewer {
    pub fn new() -> Self {
        Self {
            current: None,
            thumbs: HashMap::new(),
        }
    }

    /// Forget textures for history entries that no longer exist.
    pub fn retain_entries(&mut self, entries: &[HistoryEntry]) {
        self.thumbs
            .retain(|key, _| entries.iter().any(|e| e.created_at == *key));
    }

    fn current_texture(
        &mut self,
        ctx: &egui::Context,
        image: &ImageHandle,
    ) -> egui::TextureHandle {
        if let Some((id, tex)) = &self.current {
            if *id == image.id() {
                return tex.clone();
            }
        }
        let pixels = image.pixels();
        let preview = if pixels.width() > PREVIEW_MAX || pixels.height() > PREVIEW_MAX {
            pixels.thumbnail(PREVIEW_MAX, PREVIEW_MAX)
        } else {
            pixels.clone()
        };
        let rgba = preview.to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        let tex = ctx.load_texture(
            "current_image",
            egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()),
            egui::TextureOptions::LINEAR,
        );
        self.current = Some((image.id(), tex.clone()));
        tex
    }

    fn thumb_texture(
        &mut self,
        ctx: &egui::Context,
        entry: &HistoryEntry,
    ) -> Option<egui::TextureHandle> {
        if let Some(tex) = self.thumbs.get(&entry.created_at) {
            return Some(tex.clone());
        }
        let thumb = entry.thumbnail.as_ref()?;
        let decoded = match image::load_from_memory(&thumb.bytes) {
            Ok(img) => img.to_rgba8(),
            Err(err) => {
                tracing::warn!(%err, key = entry.created_at, "thumbnail does not decode");
                return None;
            }
        };
        let size = [decoded.width() as usize, decoded.height() as usize];
        let tex = ctx.load_texture(
            format!("history_{}", entry.created_at),
            egui::ColorImage::from_rgba_unmultiplied(size, decoded.as_raw()),
            egui::TextureOptions::LINEAR,
        );
        self.thumbs.insert(entry.created_at, tex.clone());
        Some(tex)
    }

    /// Draw `image` scaled to fit `max_size`, with an overlay while `busy`.
    pub fn show_image(
        &mut self,
        ui: &mut egui::Ui,
        image: &ImageHandle,
        max_size: egui::Vec2,
        busy: bool,
    ) {
        let tex = self.current_texture(ui.ctx(), image);
        let tex_size = tex.size_vec2();
        let scale = (max_size.x / tex_size.x).min(max_size.y / tex_size.y).min(1.0);
        let display = tex_size * scale;
        let (img_rect, _) = ui.allocate_exact_size(display, egui::Sense::hover());
        ui.painter().image(
            tex.id(),
            img_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
        if busy {
            ui.painter()
                .rect_filled(img_rect, 0.0, egui::Color32::from_black_alpha(80));
        }
    }

    /// Horizontal history strip. Returns the index of a clicked entry.
    pub fn show_history_strip(
        &mut self,
        ui: &mut egui::Ui,
        entries: &[HistoryEntry],
        enabled: bool,
    ) -> Option<usize> {
        let mut clicked = None;
        ui.label(egui::RichText::new(format!("📚 Image History ({})", entries.len())).strong());
        egui::ScrollArea::horizontal()
            .id_salt("history_strip")
            .auto_shrink([false, true])
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let last = entries.len().saturating_sub(1);
                    for (index, entry) in entries.iter().enumerate() {
                        let tex = self.thumb_texture(ui.ctx(), entry);
                        let resp =
                            draw_history_cell(ui, entry, tex.as_ref(), index == last, enabled);
                        let hover = match entry.provenance {
                            Provenance::Original => format!("Original: {}", entry.instruction),
                            Provenance::Generated => entry.instruction.clone(),
                        };
                        if resp.on_hover_text(hover).clicked() {
                            clicked = Some(index);
                        }
                    }
                });
            });
        clicked
    }
}

fn draw_history_cell(
    ui: &mut egui::Ui,
    entry: &HistoryEntry,
    tex: Option<&egui::TextureHandle>,
    is_current: bool,
    enabled: bool,
) -> egui::Response {
    let sense = if enabled {
        egui::Sense::click()
    } else {
        egui::Sense::hover()
    };
    let (resp, painter) = ui.allocate_painter(egui::vec2(STRIP_CELL, STRIP_CELL + 18.0), sense);
    let rect = resp.rect;
    let img_rect = egui::Rect::from_min_size(rect.min, egui::vec2(STRIP_CELL, STRIP_CELL));

    match tex {
        Some(tex) => {
            let tex_size = tex.size_vec2();
            let scale = (STRIP_CELL / tex_size.x).min(STRIP_CELL / tex_size.y);
            let display = tex_size * scale;
            let offset = (egui::vec2(STRIP_CELL, STRIP_CELL) - display) * 0.5;
            painter.image(
                tex.id(),
                egui::Rect::from_min_size(img_rect.min + offset, display),
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        None => {
            painter.rect_filled(img_rect, 6.0, egui::Color32::from_gray(40));
        }
    }

    let stroke = if is_current {
        egui::Stroke::new(2.0, ui.visuals().selection.stroke.color)
    } else if enabled && resp.hovered() {
        egui::Stroke::new(2.0, ui.visuals().widgets.hovered.fg_stroke.color)
    } else {
        egui::Stroke::new(1.0, ui.visuals().widgets.noninteractive.bg_stroke.color)
    };
    painter.rect_stroke(img_rect, 6.0, stroke, egui::StrokeKind::Inside);

    if enabled && resp.hovered() && !is_current {
        painter.rect_filled(img_rect, 6.0, egui::Color32::from_black_alpha(60));
        painter.text(
            img_rect.center(),
            egui::Align2::CENTER_CENTER,
            "Restore",
            egui::FontId::proportional(12.0),
            egui::Color32::WHITE,
        );
    }

    painter.text(
        egui::pos2(rect.center().x, img_rect.max.y + 9.0),
        egui::Align2::CENTER_CENTER,
        short_name(&entry.instruction, 12),
        egui::FontId::proportional(10.0),
        ui.visuals().text_color(),
    );

    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_to_handle;
    use crate::codec::tests::png_bytes;
    use crate::history::EditHistory;

    fn entry(history: &mut EditHistory, instruction: &str) -> HistoryEntry {
        HistoryEntry {
            image: decode_to_handle(png_bytes(2, 2, [9, 9, 9, 255]), None).expect("decode"),
            thumbnail: None,
            instruction: instruction.to_string(),
            created_at: history.stamp(),
            provenance: Provenance::Original,
        }
    }

    fn cache(viewer: &mut Viewer, ctx: &egui::Context, entry: &HistoryEntry) {
        let tex = ctx.load_texture(
            format!("history_{}", entry.created_at),
            egui::ColorImage::new([1, 1], egui::Color32::WHITE),
            egui::TextureOptions::LINEAR,
        );
        viewer.thumbs.insert(entry.created_at, tex);
    }

    #[test]
    fn new_session_drops_textures_of_the_previous_one() {
        let ctx = egui::Context::default();
        let mut history = EditHistory::new();
        let mut viewer = Viewer::new();

        let old_original = entry(&mut history, "Original upload");
        let old_edit = entry(&mut history, "make it blue");
        cache(&mut viewer, &ctx, &old_original);
        cache(&mut viewer, &ctx, &old_edit);

        history.reset();
        let new_original = entry(&mut history, "Pasted image");
        cache(&mut viewer, &ctx, &new_original);

        viewer.retain_entries(std::slice::from_ref(&new_original));
        assert_eq!(viewer.thumbs.len(), 1);
        assert!(viewer.thumbs.contains_key(&new_original.created_at));
    }

    #[test]
    fn retain_keeps_textures_of_live_entries() {
        let ctx = egui::Context::default();
        let mut history = EditHistory::new();
        let mut viewer = Viewer::new();
        let entries = vec![entry(&mut history, "a"), entry(&mut history, "b")];
        for e in &entries {
            cache(&mut viewer, &ctx, e);
        }

        viewer.retain_entries(&entries);
        assert_eq!(viewer.thumbs.len(), 2);
        viewer.retain_entries(&entries[..1]);
        assert_eq!(viewer.thumbs.len(), 1);
    }
}
