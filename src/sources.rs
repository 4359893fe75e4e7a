//! Byte sources: the channels an image can arrive through.
//!
//! File picking, drag-and-drop and clipboard paste all reduce to a
//! [`SourceImage`]; payloads that carry no image yield `None`.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::thumbnail::is_supported_image;

/// Label recorded for images that arrive by paste.
pub const PASTED_LABEL: &str = "Pasted image";

/// Raw image bytes plus what the delivering channel knows about them.
#[derive(Clone)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
    pub filename: String,
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("filename", &self.filename)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

pub trait ByteSource {
    type Payload;

    fn try_extract_image(&self, payload: Self::Payload) -> Option<SourceImage>;
}

fn mime_for_path(path: &Path) -> Option<String> {
    ImageFormat::from_path(path)
        .ok()
        .map(|f| f.to_mime_type().to_string())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Reads image files chosen in the browser or passed on the command line.
pub struct FileSource;

impl ByteSource for FileSource {
    type Payload = PathBuf;

    fn try_extract_image(&self, path: PathBuf) -> Option<SourceImage> {
        if !is_supported_image(&path) {
            tracing::debug!(path = %path.display(), "not an image file");
            return None;
        }
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not read image file");
                return None;
            }
        };
        Some(SourceImage {
            bytes,
            mime: mime_for_path(&path),
            filename: file_name_of(&path),
        })
    }
}

/// Files dropped onto the window. Bytes are present on web, a path on native.
pub struct DropSource;

impl ByteSource for DropSource {
    type Payload = egui::DroppedFile;

    fn try_extract_image(&self, file: egui::DroppedFile) -> Option<SourceImage> {
        if let Some(bytes) = file.bytes {
            let mime = Some(file.mime).filter(|m| m.starts_with("image/"));
            let by_name = is_supported_image(Path::new(&file.name));
            if mime.is_none() && !by_name {
                return None;
            }
            return Some(SourceImage {
                bytes: bytes.to_vec(),
                mime,
                filename: file.name,
            });
        }
        file.path.and_then(|path| FileSource.try_extract_image(path))
    }
}

/// What the system clipboard held at paste time.
pub enum ClipboardPayload {
    Image {
        width: usize,
        height: usize,
        rgba: Vec<u8>,
    },
    Text(String),
}

/// Clipboard paste. Raw pixels are re-encoded as PNG; text is accepted when
/// it names an image file on disk.
pub struct ClipboardSource;

impl ByteSource for ClipboardSource {
    type Payload = ClipboardPayload;

    fn try_extract_image(&self, payload: ClipboardPayload) -> Option<SourceImage> {
        match payload {
            ClipboardPayload::Image {
                width,
                height,
                rgba,
            } => {
                let img = RgbaImage::from_raw(
                    u32::try_from(width).ok()?,
                    u32::try_from(height).ok()?,
                    rgba,
                )?;
                let mut bytes = Vec::new();
                if let Err(err) = DynamicImage::ImageRgba8(img)
                    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                {
                    tracing::warn!(%err, "could not encode clipboard image");
                    return None;
                }
                Some(SourceImage {
                    bytes,
                    mime: Some("image/png".to_string()),
                    filename: "pasted-image.png".to_string(),
                })
            }
            ClipboardPayload::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() || trimmed.contains('\n') {
                    return None;
                }
                let path = PathBuf::from(trimmed);
                if !path.is_file() {
                    return None;
                }
                FileSource.try_extract_image(path)
            }
        }
    }
}

/// Snapshot the system clipboard, preferring image data over text.
pub fn read_system_clipboard() -> Option<ClipboardPayload> {
    let mut clipboard = match arboard::Clipboard::new() {
        Ok(clipboard) => clipboard,
        Err(err) => {
            tracing::warn!(%err, "clipboard unavailable");
            return None;
        }
    };
    if let Ok(data) = clipboard.get_image() {
        return Some(ClipboardPayload::Image {
            width: data.width,
            height: data.height,
            rgba: data.bytes.into_owned(),
        });
    }
    clipboard.get_text().ok().map(ClipboardPayload::Text)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec::tests::png_bytes;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("thumbedit-sources-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join(name);
        std::fs::write(&path, bytes).expect("write temp file");
        path
    }

    #[test]
    fn file_source_reads_bytes_and_guesses_mime() {
        let png = png_bytes(3, 3, [1, 2, 3, 255]);
        let path = temp_file("picked.png", &png);

        let source = FileSource.try_extract_image(path).expect("image");
        assert_eq!(source.bytes, png);
        assert_eq!(source.mime.as_deref(), Some("image/png"));
        assert_eq!(source.filename, "picked.png");
    }

    #[test]
    fn file_source_skips_non_images_and_missing_files() {
        let path = temp_file("notes.txt", b"hello");
        assert!(FileSource.try_extract_image(path).is_none());
        assert!(
            FileSource
                .try_extract_image(PathBuf::from("/definitely/missing/file.png"))
                .is_none()
        );
    }

    #[test]
    fn clipboard_pixels_become_png() {
        let payload = ClipboardPayload::Image {
            width: 2,
            height: 1,
            rgba: vec![255, 0, 0, 255, 0, 255, 0, 255],
        };
        let source = ClipboardSource.try_extract_image(payload).expect("image");
        assert_eq!(source.mime.as_deref(), Some("image/png"));
        let decoded = image::load_from_memory(&source.bytes).expect("png");
        assert_eq!((decoded.width(), decoded.height()), (2, 1));
        assert_eq!(decoded.to_rgba8().get_pixel(1, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn clipboard_pixels_with_wrong_length_are_ignored() {
        let payload = ClipboardPayload::Image {
            width: 4,
            height: 4,
            rgba: vec![0; 3],
        };
        assert!(ClipboardSource.try_extract_image(payload).is_none());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn clipboard_dimensions_beyond_u32_are_ignored() {
        // 2^32 + 1 would wrap to 1 and match the 4-byte buffer.
        let payload = ClipboardPayload::Image {
            width: (u32::MAX as usize).wrapping_add(2),
            height: 1,
            rgba: vec![0; 4],
        };
        assert!(ClipboardSource.try_extract_image(payload).is_none());
    }

    #[test]
    fn clipboard_text_only_counts_when_it_names_an_image() {
        let png = png_bytes(1, 1, [0, 0, 0, 255]);
        let path = temp_file("copied.png", &png);

        let from_path = ClipboardSource
            .try_extract_image(ClipboardPayload::Text(format!("  {}\n", path.display())))
            .expect("image path");
        assert_eq!(from_path.bytes, png);

        assert!(
            ClipboardSource
                .try_extract_image(ClipboardPayload::Text("make it blue".to_string()))
                .is_none()
        );
    }

    #[test]
    fn dropped_bytes_are_filtered_by_type() {
        let png = png_bytes(1, 1, [0, 0, 0, 255]);
        let image_drop = egui::DroppedFile {
            name: "drop.png".to_string(),
            mime: "image/png".to_string(),
            bytes: Some(Arc::from(png.clone().into_boxed_slice())),
            ..Default::default()
        };
        let source = DropSource.try_extract_image(image_drop).expect("image");
        assert_eq!(source.bytes, png);
        assert_eq!(source.mime.as_deref(), Some("image/png"));

        let text_drop = egui::DroppedFile {
            name: "readme.md".to_string(),
            mime: "text/markdown".to_string(),
            bytes: Some(Arc::from(b"# hi".to_vec().into_boxed_slice())),
            ..Default::default()
        };
        assert!(DropSource.try_extract_image(text_drop).is_none());
    }
}
