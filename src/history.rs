use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::ImageHandle;
use crate::thumbnail::Thumbnail;

/// Label recorded for the first entry of every session.
pub const ORIGINAL_LABEL: &str = "Original upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Original,
    Generated,
}

/// One recorded step: the original upload or a successful edit.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub image: ImageHandle,
    pub thumbnail: Option<Thumbnail>,
    pub instruction: String,
    /// Milliseconds since the epoch, strictly increasing. Doubles as the UI key.
    pub created_at: u64,
    pub provenance: Provenance,
}

/// Linear edit history. Grows at the tail, shrinks from the tail, never reorders.
#[derive(Debug, Default)]
pub struct EditHistory {
    entries: Vec<HistoryEntry>,
    last_stamp: u64,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Drop every entry after `index`. A no-op when `index` is the last entry or beyond.
    pub fn truncate_after(&mut self, index: usize) {
        self.entries.truncate(index.saturating_add(1));
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next `created_at` value: wall-clock millis, bumped past the previous
    /// stamp when the clock has not advanced. Survives `reset`.
    pub fn stamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.last_stamp = now.max(self.last_stamp + 1);
        self.last_stamp
    }
}
