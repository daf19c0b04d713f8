//! Generated placeholder images.
//!
//! Feed snapshots show a placeholder tile while a chunked picture is still
//! being resolved.  The tile colour is derived from the post id so the same
//! post always renders the same placeholder, which keeps snapshots visually
//! stable while chunks load.

use base64::prelude::{Engine, BASE64_STANDARD};
use rand::RngCore;

use lumagram_shared::PostId;

/// Deterministic loading placeholder for a post.
pub fn post_placeholder(post: &PostId) -> String {
    tile(derive_rgb(post.as_str()))
}

/// Fallback avatar showing the first letter of a display name.
pub fn avatar_placeholder(display_name: &str) -> String {
    let initial = display_name
        .chars()
        .find(|c| c.is_alphanumeric())
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "?".to_owned());
    let fill = hex::encode(derive_rgb(display_name));
    let svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='600' height='600'>\
         <rect width='600' height='600' fill='#{fill}'/>\
         <text x='50%' y='50%' dominant-baseline='central' text-anchor='middle' \
         font-family='sans-serif' font-size='280' fill='#ffffff'>{initial}</text>\
         </svg>"
    );
    encode_svg(&svg)
}

/// Placeholder for a chunked picture that could not be resolved.  Random on
/// purpose: a later retry visibly replaces the tile.
pub fn fallback_placeholder() -> String {
    let mut rgb = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut rgb);
    tile(rgb)
}

fn derive_rgb(seed: &str) -> [u8; 3] {
    let digest = blake3::hash(seed.as_bytes());
    let bytes = digest.as_bytes();
    [bytes[0], bytes[1], bytes[2]]
}

fn tile(rgb: [u8; 3]) -> String {
    let fill = hex::encode(rgb);
    let svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='600' height='600'>\
         <rect width='600' height='600' fill='#{fill}'/>\
         </svg>"
    );
    encode_svg(&svg)
}

fn encode_svg(svg: &str) -> String {
    format!("data:image/svg+xml;base64,{}", BASE64_STANDARD.encode(svg))
}
