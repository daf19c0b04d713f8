//! Data-URI helpers for stored image payloads.

use base64::prelude::{Engine, BASE64_STANDARD};

/// Prefix every stored image payload must carry.
pub const IMAGE_PREFIX: &str = "data:image/";

/// Whether a string looks like an inline image payload.
pub fn is_image_data_uri(payload: &str) -> bool {
    payload.starts_with(IMAGE_PREFIX)
}

/// Renders raw image bytes as a base64 data URI for the given MIME subtype.
pub fn encode(subtype: &str, bytes: &[u8]) -> String {
    format!("data:image/{subtype};base64,{}", BASE64_STANDARD.encode(bytes))
}
