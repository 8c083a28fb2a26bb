//! Deterministic stand-in images for when no live provider produced anything.
//!
//! The seed prompt is hashed once; the hash fixes the base hue and seeds the
//! generator that picks saturation and lightness, so the same `(count, seed)`
//! pair always yields byte-identical data URIs. Nothing here touches the
//! network or can fail.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

pub const SVG_DATA_URI_PREFIX: &str = "data:image/svg+xml;charset=utf-8,";

const SIZE: u32 = 512;
const HUE_STEP: u128 = 120;

/// Returns exactly `count` SVG data URIs derived from `seed_prompt`.
pub fn synthesize(count: usize, seed_prompt: &str) -> Vec<String> {
    let digest = prompt_digest(seed_prompt);
    let hue_base = hue_base(&digest);
    let mut rng = StdRng::seed_from_u64(rng_seed(&digest));

    (0..count)
        .map(|idx| {
            let hue = (hue_base + idx as u128 * HUE_STEP) % 360;
            let saturation: u8 = rng.gen_range(60..=100);
            let lightness: u8 = rng.gen_range(50..=80);
            let color = format!("hsl({hue}, {saturation}%, {lightness}%)");
            svg_data_uri(&color, idx + 1)
        })
        .collect()
}

pub fn is_placeholder_uri(uri: &str) -> bool {
    uri.starts_with(SVG_DATA_URI_PREFIX)
}

fn prompt_digest(prompt: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.finalize().into()
}

fn hue_base(digest: &[u8; 32]) -> u128 {
    let mut head = [0u8; 16];
    head.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(head) % 360
}

fn rng_seed(digest: &[u8; 32]) -> u64 {
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[16..24]);
    u64::from_be_bytes(tail)
}

fn svg_data_uri(color: &str, label_index: usize) -> String {
    let svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{SIZE}' height='{SIZE}' viewBox='0 0 {SIZE} {SIZE}'>\
         <rect width='100%' height='100%' fill='{color}'/>\
         <text x='50%' y='50%' font-size='24' fill='white' text-anchor='middle' dominant-baseline='middle'>\
         Placeholder {label_index}</text>\
         </svg>"
    );
    format!("{SVG_DATA_URI_PREFIX}{}", urlencoding::encode(&svg))
}
