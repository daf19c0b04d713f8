use bytes::Bytes;
use image::ImageFormat;

/// A picture selected for upload, before validation and compression.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Raw file bytes.
    pub bytes: Bytes,
    /// MIME type reported by the picker, e.g. `image/png`.
    pub content_type: String,
}

impl ImageUpload {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Only image MIME types are accepted for upload.
    pub fn is_permitted_type(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Sniffs the actual format from the magic bytes.  The picker's MIME
    /// type is advisory; this is what decides whether the file is accepted.
    pub fn sniffed_format(&self) -> Option<ImageFormat> {
        match image::guess_format(&self.bytes) {
            Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => {
                Some(format)
            }
            _ => None,
        }
    }
}
