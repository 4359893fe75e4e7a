use std::sync::Arc;
use std::sync::mpsc;

use crate::{
    browser::Browser,
    capability::{EditCapability, EditOutcome},
    config::AppConfig,
    error::{EditorError, Result},
    history::ORIGINAL_LABEL,
    session::{EditSession, MessageKind, PendingEdit, SessionPhase},
    sources::{
        ByteSource, ClipboardSource, DropSource, FileSource, PASTED_LABEL, SourceImage,
        read_system_clipboard,
    },
    viewer::Viewer,
};

pub struct EditorApp {
    session: EditSession,
    browser: Browser,
    viewer: Viewer,
    show_browser: bool,
    /// Blocking alert for rejected input.
    alert: Option<String>,
    /// The request on the worker thread and where its answer arrives.
    in_flight: Option<(PendingEdit, mpsc::Receiver<Result<EditOutcome>>)>,
    config: AppConfig,
}

impl EditorApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        capability: Arc<dyn EditCapability>,
    ) -> Self {
        let browser = Browser::new(config.browse_path.clone());
        let session = EditSession::with_thumbnail_max(capability, config.thumbnail_max());
        Self {
            session,
            browser,
            viewer: Viewer::new(),
            show_browser: false,
            alert: None,
            in_flight: None,
            config,
        }
    }

    fn ingest(&mut self, source: SourceImage, label: &str) {
        match self.session.ingest_source(source, label) {
            Ok(()) => {
                self.show_browser = false;
                self.viewer.retain_entries(self.session.entries());
            }
            Err(EditorError::Busy) => {
                self.alert = Some("Wait for the current edit to finish first".to_string());
            }
            // Decode failures are already in the status line.
            Err(_) => {}
        }
    }

    fn paste_from_clipboard(&mut self) {
        let source = read_system_clipboard().and_then(|p| ClipboardSource.try_extract_image(p));
        match source {
            Some(source) => self.ingest(source, PASTED_LABEL),
            None => tracing::debug!("clipboard holds no image"),
        }
    }

    fn start_edit(&mut self, ctx: &egui::Context) {
        let instruction = self.session.pending_instruction().to_string();
        let pending = match self.session.begin_edit(&instruction) {
            Ok(pending) => pending,
            Err(err) => {
                self.alert = Some(err.to_string());
                return;
            }
        };

        let capability = self.session.capability();
        let (tx, rx) = mpsc::channel();
        let ctx2 = ctx.clone();
        let request = pending.clone();
        std::thread::spawn(move || {
            let result = request.run(capability.as_ref());
            let _ = tx.send(result);
            ctx2.request_repaint();
        });
        self.in_flight = Some((pending, rx));
    }

    fn poll_edit(&mut self) {
        let Some((pending, rx)) = self.in_flight.take() else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(mpsc::TryRecvError::Empty) => {
                self.in_flight = Some((pending, rx));
                return;
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                tracing::warn!("edit worker exited without a result");
                Err(EditorError::Transport(
                    "edit worker stopped unexpectedly".to_string(),
                ))
            }
        };
        // Failures are reported through the session status line.
        let _ = self.session.complete_edit(&pending, result);
        self.viewer.retain_entries(self.session.entries());
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(source) = dropped
            .into_iter()
            .find_map(|file| DropSource.try_extract_image(file))
        {
            let label = if self.session.phase() == SessionPhase::Empty {
                ORIGINAL_LABEL
            } else {
                "Dropped image"
            };
            self.ingest(source, label);
        }

        let focused = ctx.memory(|m| m.focused().is_some());
        if ctx.input(|i| paste_requested(&i.events, focused)) {
            self.paste_from_clipboard();
        }
    }

    fn show_empty(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() * 0.3);
            ui.heading(egui::RichText::new("✨ Thumbnail Editor").size(32.0));
            ui.add_space(8.0);
            ui.label(egui::RichText::new("Upload an image to get started").weak());
            ui.add_space(16.0);
            ui.horizontal(|ui| {
                ui.add_space((ui.available_width() - 260.0).max(0.0) * 0.5);
                if ui.button("📤 Open image…").clicked() {
                    self.show_browser = true;
                }
                if ui
                    .button("📋 Paste")
                    .on_hover_text("Paste an image from the clipboard")
                    .clicked()
                {
                    self.paste_from_clipboard();
                }
            });
            ui.add_space(8.0);
            ui.label(egui::RichText::new("or drop an image file onto the window").weak());
            ui.label(
                egui::RichText::new("Screenshots on the clipboard go in through Paste").weak(),
            );
            self.show_status(ui);
        });
    }

    fn show_editor(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let busy = self.session.is_busy();
        let Some(image) = self.session.current_image().cloned() else {
            return;
        };

        ui.vertical_centered(|ui| {
            let max = egui::vec2(
                ui.available_width(),
                (ui.available_height() - 200.0).max(160.0),
            );
            self.viewer.show_image(ui, &image, max, busy);
            ui.label(
                egui::RichText::new(format!(
                    "{}×{} · {} · {} KB",
                    image.width(),
                    image.height(),
                    image.mime(),
                    image.byte_len() / 1024
                ))
                .weak()
                .small(),
            );
        });

        ui.add_space(12.0);
        ui.label("🎨 Edit Instructions");
        let response = ui.add_enabled(
            !busy,
            egui::TextEdit::singleline(self.session.pending_instruction_mut())
                .hint_text("Describe how you want to edit this thumbnail...")
                .desired_width(f32::INFINITY),
        );
        let submit_by_enter =
            response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

        let can_submit = !busy && !self.session.pending_instruction().trim().is_empty();
        ui.add_space(6.0);
        let clicked = ui
            .add_enabled_ui(can_submit, |ui| {
                if busy {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Processing...");
                    });
                    false
                } else {
                    ui.add_sized(
                        [ui.available_width(), 32.0],
                        egui::Button::new("🚀 Process Image"),
                    )
                    .clicked()
                }
            })
            .inner;
        if clicked || (submit_by_enter && can_submit) {
            self.start_edit(ctx);
        }

        ui.add_space(6.0);
        self.show_status(ui);

        ui.add_space(6.0);
        if ui.button("🔄 Upload New Image").clicked() {
            self.session.reset_session();
            self.viewer.retain_entries(&[]);
        }
    }

    fn show_status(&self, ui: &mut egui::Ui) {
        let Some(status) = self.session.status() else {
            return;
        };
        let color = match status.kind {
            MessageKind::Success => egui::Color32::from_rgb(40, 160, 80),
            MessageKind::Info => ui.visuals().hyperlink_color,
            MessageKind::Error => ui.visuals().error_fg_color,
        };
        ui.colored_label(color, &status.text);
    }

    fn show_alert(&mut self, ctx: &egui::Context) {
        let Some(text) = self.alert.clone() else {
            return;
        };
        let modal = egui::Modal::new(egui::Id::new("input_alert")).show(ctx, |ui| {
            ui.set_width(320.0);
            ui.label(text);
            ui.add_space(8.0);
            ui.button("OK").clicked()
        });
        if modal.inner || modal.should_close() {
            self.alert = None;
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.config.window_width = Some(rect.width());
            self.config.window_height = Some(rect.height());
        }

        self.browser.poll(ctx);
        self.poll_edit();
        self.handle_input(ctx);

        if let Some(path) = self.browser.take_picked() {
            if let Some(source) = FileSource.try_extract_image(path) {
                self.ingest(source, ORIGINAL_LABEL);
            }
        }

        egui::TopBottomPanel::top("main_menu").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open…").clicked() {
                    self.show_browser = !self.show_browser;
                }
                if ui.button("Paste").clicked() {
                    self.paste_from_clipboard();
                }
            });
        });

        let entries_len = self.session.entries().len();
        if entries_len > 0 {
            let enabled = !self.session.is_busy();
            let mut restore = None;
            egui::TopBottomPanel::bottom("history_strip")
                .resizable(false)
                .show(ctx, |ui| {
                    ui.add_space(4.0);
                    restore =
                        self.viewer
                            .show_history_strip(ui, self.session.entries(), enabled);
                });
            if let Some(index) = restore {
                if let Err(err) = self.session.restore_from_history(index) {
                    tracing::warn!(%err, "restore rejected");
                }
                self.viewer.retain_entries(self.session.entries());
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.session.phase() == SessionPhase::Empty {
                self.show_empty(ui);
            } else {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| self.show_editor(ui, ctx));
            }
        });

        let mut show_browser = self.show_browser;
        egui::Window::new("Open image")
            .open(&mut show_browser)
            .default_size([560.0, 520.0])
            .default_pos([40.0, 60.0])
            .show(ctx, |ui| {
                self.browser.show_contents(ui, ctx);
            });
        self.show_browser = show_browser;

        self.show_alert(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.config.browse_path = Some(self.browser.current_dir.clone());
        self.config.save();
    }
}

/// Whether this frame's input asks for a clipboard paste into the session.
///
/// The windowing layer only reports the paste shortcut when the clipboard
/// holds text, so an image-only clipboard never shows up here; the Paste
/// buttons cover that case. A focused text field keeps the paste for itself.
fn paste_requested(events: &[egui::Event], text_focused: bool) -> bool {
    if text_focused {
        return false;
    }
    events.iter().any(|event| match event {
        egui::Event::Paste(_) => true,
        egui::Event::Key {
            key: egui::Key::V,
            pressed: true,
            modifiers,
            ..
        } => modifiers.command,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::paste_requested;

    fn key_v(pressed: bool, modifiers: egui::Modifiers) -> egui::Event {
        egui::Event::Key {
            key: egui::Key::V,
            physical_key: None,
            pressed,
            repeat: false,
            modifiers,
        }
    }

    #[test]
    fn paste_event_requests_paste_when_nothing_is_focused() {
        let events = [egui::Event::Paste("/tmp/cat.png".to_string())];
        assert!(paste_requested(&events, false));
    }

    #[test]
    fn focused_text_field_keeps_the_paste() {
        let events = [
            egui::Event::Paste("make it blue".to_string()),
            key_v(true, egui::Modifiers::COMMAND),
        ];
        assert!(!paste_requested(&events, true));
    }

    #[test]
    fn command_v_press_requests_paste() {
        assert!(paste_requested(&[key_v(true, egui::Modifiers::COMMAND)], false));
    }

    #[test]
    fn plain_v_and_key_release_are_ignored() {
        assert!(!paste_requested(&[key_v(true, egui::Modifiers::NONE)], false));
        assert!(!paste_requested(&[key_v(false, egui::Modifiers::COMMAND)], false));
        assert!(!paste_requested(&[], false));
    }
}
