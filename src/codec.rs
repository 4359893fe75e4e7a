use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::DynamicImage;

use crate::error::{EditorError, Result};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// A decoded image together with the exact bytes it was decoded from.
///
/// Cloning is cheap: bytes and pixels are shared.
#[derive(Clone)]
pub struct ImageHandle {
    id: u64,
    bytes: Arc<[u8]>,
    mime: String,
    pixels: Arc<DynamicImage>,
}

impl ImageHandle {
    /// Process-unique identity, stable across clones. Used as a texture key.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("id", &self.id)
            .field("mime", &self.mime)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Transportable form of an image: what gets uploaded as the next edit input.
#[derive(Clone)]
pub struct ImagePayload {
    pub bytes: Arc<[u8]>,
    pub mime: String,
    pub filename: String,
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime", &self.mime)
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Decode `bytes` into a displayable handle.
///
/// `mime` is trusted when it names an image type; otherwise the type is
/// sniffed from the magic bytes.
pub fn decode_to_handle(
    bytes: impl Into<Arc<[u8]>>,
    mime: Option<&str>,
) -> Result<ImageHandle> {
    let bytes: Arc<[u8]> = bytes.into();
    if bytes.is_empty() {
        return Err(EditorError::Decode("empty image data".to_string()));
    }

    let format = image::guess_format(&bytes).map_err(EditorError::decode)?;
    let mime = match mime.map(str::trim) {
        Some(m) if m.starts_with("image/") => m.to_string(),
        _ => format.to_mime_type().to_string(),
    };
    let pixels =
        image::load_from_memory_with_format(&bytes, format).map_err(EditorError::decode)?;

    Ok(ImageHandle {
        id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
        bytes,
        mime,
        pixels: Arc::new(pixels),
    })
}

/// Inverse of [`decode_to_handle`]: the original bytes, unchanged.
pub fn handle_to_bytes(handle: &ImageHandle, filename: &str) -> ImagePayload {
    ImagePayload {
        bytes: handle.bytes.clone(),
        mime: handle.mime.clone(),
        filename: filename.to_string(),
    }
}

pub fn to_data_url(payload: &ImagePayload) -> String {
    format!("data:{};base64,{}", payload.mime, BASE64.encode(&payload.bytes))
}

/// Parse a `data:<mime>;base64,<data>` URL into bytes and MIME type.
pub fn parse_data_url(url: &str) -> Result<(Vec<u8>, String)> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| EditorError::Decode("not a data URL".to_string()))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| EditorError::Decode("data URL has no payload".to_string()))?;

    let mut params = meta.split(';');
    let mime = params.next().unwrap_or_default().trim();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(EditorError::Decode(
            "only base64 data URLs are supported".to_string(),
        ));
    }

    let bytes = BASE64.decode(data.trim()).map_err(EditorError::decode)?;
    let mime = if mime.is_empty() {
        "application/octet-stream".to_string()
    } else {
        mime.to_ascii_lowercase()
    };
    Ok((bytes, mime))
}

/// Build an upload payload from a data URL returned by the edit service.
pub fn payload_from_data_url(url: &str, filename: &str) -> Result<ImagePayload> {
    let (bytes, mime) = parse_data_url(url)?;
    Ok(ImagePayload {
        bytes: bytes.into(),
        mime,
        filename: filename.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, ImageFormat, Rgba};

    use super::*;

    pub(crate) fn png_bytes(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(width, height, Rgba(px)));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[test]
    fn ingest_path_round_trips_bytes_exactly() {
        let png = png_bytes(7, 3, [10, 20, 30, 255]);
        let handle = decode_to_handle(png.clone(), Some("image/png")).expect("decode");
        let payload = handle_to_bytes(&handle, "upload.png");

        assert_eq!(&*payload.bytes, png.as_slice());
        assert_eq!(payload.mime, "image/png");
        assert_eq!(payload.filename, "upload.png");
        assert_eq!((handle.width(), handle.height()), (7, 3));
    }

    #[test]
    fn mime_is_sniffed_when_caller_gives_none_or_junk() {
        let png = png_bytes(2, 2, [0, 0, 0, 255]);
        let sniffed = decode_to_handle(png.clone(), None).expect("decode");
        assert_eq!(sniffed.mime(), "image/png");

        let junk = decode_to_handle(png, Some("application/octet-stream")).expect("decode");
        assert_eq!(junk.mime(), "image/png");
    }

    #[test]
    fn malformed_bytes_are_a_decode_error() {
        let err = decode_to_handle(b"definitely not an image".to_vec(), Some("image/png"))
            .expect_err("should fail");
        assert!(matches!(err, EditorError::Decode(_)));

        let err = decode_to_handle(Vec::new(), None).expect_err("empty should fail");
        assert!(matches!(err, EditorError::Decode(_)));
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let png = png_bytes(16, 16, [1, 2, 3, 255]);
        let err = decode_to_handle(png[..png.len() / 2].to_vec(), None).expect_err("truncated");
        assert!(matches!(err, EditorError::Decode(_)));
    }

    #[test]
    fn clones_share_identity_but_decodes_do_not() {
        let png = png_bytes(1, 1, [0, 0, 0, 255]);
        let a = decode_to_handle(png.clone(), None).expect("decode");
        let b = decode_to_handle(png, None).expect("decode");
        assert_eq!(a.id(), a.clone().id());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn data_url_survives_encode_and_parse() {
        let png = png_bytes(3, 3, [9, 9, 9, 255]);
        let handle = decode_to_handle(png.clone(), None).expect("decode");
        let url = to_data_url(&handle_to_bytes(&handle, "x.png"));
        assert!(url.starts_with("data:image/png;base64,"));

        let payload = payload_from_data_url(&url, "generated-image.png").expect("parse");
        assert_eq!(&*payload.bytes, png.as_slice());
        assert_eq!(payload.mime, "image/png");
        assert_eq!(payload.filename, "generated-image.png");
    }

    #[test]
    fn data_url_rejects_non_base64_and_garbage() {
        assert!(matches!(
            parse_data_url("data:image/png,rawtext"),
            Err(EditorError::Decode(_))
        ));
        assert!(matches!(
            parse_data_url("https://example.com/a.png"),
            Err(EditorError::Decode(_))
        ));
        assert!(matches!(
            parse_data_url("data:image/png;base64,@@@"),
            Err(EditorError::Decode(_))
        ));
    }

    #[test]
    fn data_url_without_mime_falls_back_to_octet_stream() {
        let (bytes, mime) = parse_data_url("data:;base64,AAEC").expect("parse");
        assert_eq!(bytes, vec![0, 1, 2]);
        assert_eq!(mime, "application/octet-stream");
    }
}
