use thiserror::Error;

/// Errors produced by the edit session and its collaborators.
#[derive(Error, Debug)]
pub enum EditorError {
    /// Input rejected before any work was started.
    #[error("{0}")]
    Validation(&'static str),

    /// An edit request is still in flight.
    #[error("An edit is already in progress")]
    Busy,

    /// Image bytes (or a data URL) could not be decoded.
    #[error("Could not decode image: {0}")]
    Decode(String),

    /// Thumbnail or payload encoding failed.
    #[error("Could not encode image: {0}")]
    Encode(#[from] image::ImageError),

    /// The edit service could not be reached or answered with garbage.
    #[error("Failed to reach edit service: {0}")]
    Transport(String),

    /// The edit service was reached but reported a failure.
    #[error("{0}")]
    Provider(String),

    /// A history index outside the current sequence.
    #[error("History index {index} out of range (history has {len} entries)")]
    Range { index: usize, len: usize },
}

impl EditorError {
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EditorError>;
