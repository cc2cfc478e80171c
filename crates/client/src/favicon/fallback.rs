//! Deterministic favicon placeholders.

use sha2::{Digest, Sha256};

use markcache_core::{FaviconOptions, FaviconResult, ResolutionSource};

const AVATAR_ENDPOINT: &str = "https://ui-avatars.com/api/";

/// Background colours for lettered avatars.
const PALETTE: [&str; 8] = ["1abc9c", "3498db", "9b59b6", "e67e22", "e74c3c", "2ecc71", "34495e", "f39c12"];

/// Background of the neutral icon used when per-domain avatars are off.
const NEUTRAL: &str = "9e9e9e";

/// Letter shown on a domain's avatar: its first alphanumeric character.
pub fn avatar_letter(domain: &str) -> char {
    domain
        .chars()
        .find(|c| c.is_alphanumeric())
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('?')
}

/// Palette colour for a domain, stable across runs.
pub fn palette_color(domain: &str) -> &'static str {
    let digest = Sha256::digest(domain.as_bytes());
    PALETTE[digest[0] as usize % PALETTE.len()]
}

fn avatar_url(name: char, size: u32, background: &str) -> String {
    let mut url = format!("{AVATAR_ENDPOINT}?name=");
    if name.is_ascii_alphanumeric() {
        url.push(name);
    } else {
        url.extend(name.to_string().bytes().map(|b| format!("%{b:02X}")));
    }
    url.push_str(&format!("&size={size}&background={background}&color=ffffff&bold=true&format=png"));
    url
}

/// Placeholder favicon for `domain`.
///
/// Pure and total: the same domain and options always give the same URL.
pub fn fallback_favicon(domain: &str, options: &FaviconOptions) -> FaviconResult {
    let url = if options.fallback_to_generic {
        avatar_url(avatar_letter(domain), options.size, palette_color(domain))
    } else {
        avatar_url('?', options.size, NEUTRAL)
    };

    FaviconResult { url, source: ResolutionSource::Fallback, cached: false, size: options.size }
}
