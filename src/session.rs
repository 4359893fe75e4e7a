//! Edit session controller.
//!
//! Owns the history and the current image, and drives the
//! `Empty -> Ready -> Submitting -> Ready` state machine. An edit is split in
//! three steps so the network call can run off the UI thread:
//! [`EditSession::begin_edit`] validates and closes the busy gate,
//! [`PendingEdit::run`] performs the request, and
//! [`EditSession::complete_edit`] applies the result.

use std::sync::Arc;

use crate::capability::{EditCapability, EditOutcome};
use crate::codec::{ImageHandle, ImagePayload, decode_to_handle, handle_to_bytes};
use crate::error::{EditorError, Result};
use crate::history::{EditHistory, HistoryEntry, Provenance};
use crate::sources::SourceImage;
use crate::thumbnail::{THUMB_SIZE, Thumbnail, generate_thumbnail};

pub const RESTORED_FILENAME: &str = "restored-image.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Empty,
    Ready,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub kind: MessageKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCompletion {
    /// A generated image was appended at `index`.
    Applied { index: usize },
    /// The service answered with text only; nothing changed.
    TextOnly,
    /// The session moved on (reset or new ingest) before the result arrived.
    Stale,
}

/// An accepted edit request, detached from the session so it can be sent to
/// a worker thread.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    generation: u64,
    payload: ImagePayload,
    instruction: String,
}

impl PendingEdit {
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn payload(&self) -> &ImagePayload {
        &self.payload
    }

    /// Blocks until the edit service answers.
    pub fn run(&self, capability: &dyn EditCapability) -> Result<EditOutcome> {
        capability.edit(&self.payload, &self.instruction)
    }
}

pub struct EditSession {
    capability: Arc<dyn EditCapability>,
    history: EditHistory,
    current: Option<ImageHandle>,
    /// Transportable form of `current`, uploaded with the next edit.
    upload: Option<ImagePayload>,
    pending_instruction: String,
    busy: bool,
    last_message: Option<StatusMessage>,
    thumbnail_max: u32,
    /// Bumped on ingest and reset; pending edits from older generations are dropped.
    generation: u64,
}

impl EditSession {
    pub fn new(capability: Arc<dyn EditCapability>) -> Self {
        Self::with_thumbnail_max(capability, THUMB_SIZE)
    }

    pub fn with_thumbnail_max(capability: Arc<dyn EditCapability>, thumbnail_max: u32) -> Self {
        Self {
            capability,
            history: EditHistory::new(),
            current: None,
            upload: None,
            pending_instruction: String::new(),
            busy: false,
            last_message: None,
            thumbnail_max: thumbnail_max.max(1),
            generation: 0,
        }
    }

    pub fn capability(&self) -> Arc<dyn EditCapability> {
        self.capability.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.busy {
            SessionPhase::Submitting
        } else if self.current.is_some() {
            SessionPhase::Ready
        } else {
            SessionPhase::Empty
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn current_image(&self) -> Option<&ImageHandle> {
        self.current.as_ref()
    }

    pub fn upload_payload(&self) -> Option<&ImagePayload> {
        self.upload.as_ref()
    }

    pub fn pending_instruction(&self) -> &str {
        &self.pending_instruction
    }

    pub fn pending_instruction_mut(&mut self) -> &mut String {
        &mut self.pending_instruction
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.last_message.as_ref()
    }

    pub fn last_message(&self) -> &str {
        self.last_message.as_ref().map_or("", |m| m.text.as_str())
    }

    fn set_message(&mut self, kind: MessageKind, text: String) {
        self.last_message = Some(StatusMessage { kind, text });
    }

    /// Start a new session from raw image bytes. Replaces any existing history.
    ///
    /// A decode failure leaves the session as it was.
    pub fn ingest_source(&mut self, source: SourceImage, label: &str) -> Result<()> {
        if self.busy {
            return Err(EditorError::Busy);
        }

        let byte_len = source.bytes.len();
        let (handle, thumbnail) = match self.prepare(source.bytes, source.mime.as_deref()) {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::warn!(filename = %source.filename, %err, "ingest failed");
                self.set_message(MessageKind::Error, format!("Error: {err}"));
                return Err(err);
            }
        };
        tracing::info!(
            filename = %source.filename,
            mime = handle.mime(),
            bytes = byte_len,
            width = handle.width(),
            height = handle.height(),
            "ingested source image"
        );

        self.generation += 1;
        self.history.reset();
        let created_at = self.history.stamp();
        self.upload = Some(handle_to_bytes(&handle, &source.filename));
        self.history.append(HistoryEntry {
            image: handle.clone(),
            thumbnail: Some(thumbnail),
            instruction: label.to_string(),
            created_at,
            provenance: Provenance::Original,
        });
        self.current = Some(handle);
        Ok(())
    }

    fn prepare(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        mime: Option<&str>,
    ) -> Result<(ImageHandle, Thumbnail)> {
        let handle = decode_to_handle(bytes, mime)?;
        let thumbnail = generate_thumbnail(&handle, self.thumbnail_max)?;
        Ok((handle, thumbnail))
    }

    /// Validate `instruction` and close the busy gate.
    ///
    /// Rejections leave the session untouched.
    pub fn begin_edit(&mut self, instruction: &str) -> Result<PendingEdit> {
        if self.busy {
            tracing::debug!("edit rejected: request already in flight");
            return Err(EditorError::Busy);
        }
        let Some(upload) = self.upload.clone() else {
            return Err(EditorError::Validation("Please load an image before editing"));
        };
        if instruction.trim().is_empty() {
            return Err(EditorError::Validation("Please enter an edit instruction"));
        }

        tracing::info!(instruction, bytes = upload.bytes.len(), "submitting edit");
        self.busy = true;
        self.pending_instruction = instruction.to_string();
        self.last_message = None;
        Ok(PendingEdit {
            generation: self.generation,
            payload: upload,
            instruction: instruction.to_string(),
        })
    }

    /// Apply the result of a request started with [`EditSession::begin_edit`].
    ///
    /// Failures only update the status message; history and the current image
    /// are left as they were before the request.
    pub fn complete_edit(
        &mut self,
        pending: &PendingEdit,
        result: Result<EditOutcome>,
    ) -> Result<EditCompletion> {
        if !self.busy || pending.generation != self.generation {
            tracing::info!(
                instruction = %pending.instruction,
                "discarding edit result from a previous session"
            );
            return Ok(EditCompletion::Stale);
        }
        self.busy = false;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(%err, "edit failed");
                self.set_message(MessageKind::Error, format!("Error: {err}"));
                return Err(err);
            }
        };

        let Some(image) = outcome.image else {
            let text = outcome.text.unwrap_or_default();
            tracing::info!(text = %text, "edit returned text only");
            let message = if text.trim().is_empty() {
                "Success!".to_string()
            } else {
                format!("Success! {text}")
            };
            self.set_message(MessageKind::Success, message);
            return Ok(EditCompletion::TextOnly);
        };

        let source_size = outcome
            .source_size
            .unwrap_or(pending.payload.bytes.len() as u64);
        match self.apply_generated(image, &pending.instruction) {
            Ok(index) => {
                tracing::info!(index, "edit applied");
                self.set_message(
                    MessageKind::Success,
                    format!(
                        "Success! Image processed ({}KB)",
                        (source_size as f64 / 1024.0).round() as u64
                    ),
                );
                Ok(EditCompletion::Applied { index })
            }
            Err(err) => {
                tracing::warn!(%err, "generated image rejected");
                self.set_message(MessageKind::Error, format!("Error: {err}"));
                Err(err)
            }
        }
    }

    fn apply_generated(&mut self, image: ImagePayload, instruction: &str) -> Result<usize> {
        let (handle, thumbnail) = self.prepare(image.bytes.clone(), Some(&image.mime))?;
        let created_at = self.history.stamp();
        self.upload = Some(handle_to_bytes(&handle, &image.filename));
        self.history.append(HistoryEntry {
            image: handle.clone(),
            thumbnail: Some(thumbnail),
            instruction: instruction.to_string(),
            created_at,
            provenance: Provenance::Generated,
        });
        self.current = Some(handle);
        self.pending_instruction.clear();
        Ok(self.history.len() - 1)
    }

    /// Run a whole edit on the calling thread.
    pub fn submit_edit(&mut self, instruction: &str) -> Result<EditCompletion> {
        let pending = self.begin_edit(instruction)?;
        let result = pending.run(self.capability.as_ref());
        self.complete_edit(&pending, result)
    }

    /// Make entry `index` current again and discard everything after it.
    pub fn restore_from_history(&mut self, index: usize) -> Result<()> {
        if self.busy {
            return Err(EditorError::Busy);
        }
        let (image, instruction) = match self.history.get(index) {
            Some(entry) => (entry.image.clone(), entry.instruction.clone()),
            None => {
                return Err(EditorError::Range {
                    index,
                    len: self.history.len(),
                });
            }
        };

        tracing::info!(index, instruction = %instruction, "restoring history entry");
        self.upload = Some(handle_to_bytes(&image, RESTORED_FILENAME));
        self.current = Some(image);
        self.history.truncate_after(index);
        self.set_message(
            MessageKind::Info,
            format!("Restored image from: \"{instruction}\""),
        );
        Ok(())
    }

    /// Drop everything and return to `Empty`. Valid in any phase.
    pub fn reset_session(&mut self) {
        tracing::info!(entries = self.history.len(), busy = self.busy, "session reset");
        self.generation += 1;
        self.busy = false;
        self.current = None;
        self.upload = None;
        self.pending_instruction.clear();
        self.last_message = None;
        self.history.reset();
    }
}
