//! Upload compression.
//!
//! Mirrors the canvas pipeline of the original web client: scale the picture
//! down to a maximum width, then re-encode as JPEG while walking the quality
//! downward until the rendered data URI fits the character target.

use std::io::Cursor;

use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use thiserror::Error;
use tracing::debug;

use lumagram_shared::constants::{
    AVATAR_MAX_WIDTH, COMPRESS_INITIAL_QUALITY, COMPRESS_MIN_QUALITY, COMPRESS_QUALITY_STEP,
    DOC_CHAR_BUDGET, POST_MAX_WIDTH,
};

use crate::data_uri;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Image decoding failed: {0}")]
    Decode(image::ImageError),

    #[error("Image encoding failed: {0}")]
    Encode(image::ImageError),
}

/// Tuning for the compression walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionProfile {
    /// Maximum pixel width; wider pictures are scaled down proportionally.
    pub max_width: u32,
    /// Character count the walk tries to bring the data URI under.
    pub target_chars: usize,
    /// First JPEG quality attempted (percent).
    pub initial_quality: u8,
    /// Lowest JPEG quality attempted (percent).
    pub min_quality: u8,
    /// Quality decrement between attempts (percent).
    pub quality_step: u8,
}

impl CompressionProfile {
    /// Profile for post pictures.
    pub fn post() -> Self {
        Self {
            max_width: POST_MAX_WIDTH,
            target_chars: DOC_CHAR_BUDGET,
            initial_quality: COMPRESS_INITIAL_QUALITY,
            min_quality: COMPRESS_MIN_QUALITY,
            quality_step: COMPRESS_QUALITY_STEP,
        }
    }

    /// Profile for profile avatars, which must always fit one document.
    pub fn avatar() -> Self {
        Self {
            max_width: AVATAR_MAX_WIDTH,
            ..Self::post()
        }
    }
}

impl Default for CompressionProfile {
    fn default() -> Self {
        Self::post()
    }
}

/// Compresses a picture into a JPEG data URI.
///
/// Returns the first rendering that fits `target_chars`, or the
/// minimum-quality rendering if none does.  The caller decides whether an
/// oversized result gets chunked or rejected.
pub fn compress_to_data_uri(
    bytes: &Bytes,
    profile: &CompressionProfile,
) -> Result<String, CompressError> {
    let decoded = image::load_from_memory(bytes).map_err(CompressError::Decode)?;
    let scaled = if decoded.width() > profile.max_width {
        decoded.resize(profile.max_width, u32::MAX, FilterType::Triangle)
    } else {
        decoded
    };
    // JPEG has no alpha channel.
    let frame = DynamicImage::ImageRgb8(scaled.to_rgb8());

    let mut quality = profile.initial_quality;
    loop {
        let uri = render_jpeg(&frame, quality)?;
        if uri.len() <= profile.target_chars || quality <= profile.min_quality {
            debug!(
                quality,
                chars = uri.len(),
                width = frame.width(),
                "compressed picture"
            );
            return Ok(uri);
        }
        quality = quality
            .saturating_sub(profile.quality_step)
            .max(profile.min_quality);
    }
}

fn render_jpeg(frame: &DynamicImage, quality: u8) -> Result<String, CompressError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
    frame
        .write_with_encoder(encoder)
        .map_err(CompressError::Encode)?;
    Ok(data_uri::encode("jpeg", &buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::prelude::{Engine, BASE64_STANDARD};
    use image::{ImageBuffer, Rgb};

    fn test_png(width: u32, height: u32) -> Bytes {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 255) as u8, (y % 255) as u8, 128])
        });
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        Bytes::from(buf)
    }

    fn decoded_width(uri: &str) -> u32 {
        let b64 = uri.strip_prefix("data:image/jpeg;base64,").unwrap();
        let raw = BASE64_STANDARD.decode(b64).unwrap();
        image::load_from_memory(&raw).unwrap().width()
    }

    #[test]
    fn test_small_picture_compresses_to_jpeg_uri() {
        let uri = compress_to_data_uri(&test_png(32, 32), &CompressionProfile::post()).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert!(uri.len() <= CompressionProfile::post().target_chars);
    }

    #[test]
    fn test_wide_picture_scaled_to_profile_width() {
        let uri = compress_to_data_uri(&test_png(1400, 700), &CompressionProfile::avatar()).unwrap();
        assert_eq!(decoded_width(&uri), AVATAR_MAX_WIDTH);
    }

    #[test]
    fn test_narrow_picture_not_upscaled() {
        let uri = compress_to_data_uri(&test_png(20, 40), &CompressionProfile::post()).unwrap();
        assert_eq!(decoded_width(&uri), 20);
    }

    #[test]
    fn test_unreachable_target_returns_floor_rendering() {
        let profile = CompressionProfile {
            target_chars: 64,
            ..CompressionProfile::post()
        };
        // No 64-character JPEG of a real picture exists; the walk must stop
        // at the quality floor and hand back its best effort.
        let uri = compress_to_data_uri(&test_png(200, 200), &profile).unwrap();
        assert!(uri.len() > profile.target_chars);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = compress_to_data_uri(&Bytes::from_static(b"not a picture"), &Default::default());
        assert!(matches!(err, Err(CompressError::Decode(_))));
    }
}
