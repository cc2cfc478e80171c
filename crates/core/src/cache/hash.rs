//! Cache key derivation.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the option digest.
const SHORT_HASH_LEN: usize = 12;

/// Stable identifier of one cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blob name the resource is stored under.
    pub fn object_path(&self) -> String {
        format!("{}.png", self.0)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short SHA-256 digest of a normalized key and its variant string.
pub fn short_hash(normalized: &str, variant: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(b"\n");
    hasher.update(variant.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(SHORT_HASH_LEN);
    digest
}

/// Cache key for a favicon of `domain` at `size` pixels.
pub fn favicon_cache_key(domain: &str, size: u32) -> CacheKey {
    let hash = short_hash(domain, &format!("size={size}"));
    CacheKey(format!("favicons/{}-{hash}", slug(domain)))
}

/// Cache key for a screenshot of the canonical `url`.
///
/// `host` only makes the key readable; uniqueness comes from hashing the full URL.
pub fn screenshot_cache_key(url: &str, host: &str, quality: u8, full_page: bool) -> CacheKey {
    let hash = short_hash(url, &format!("quality={quality};full_page={full_page}"));
    CacheKey(format!("screenshots/{}-{hash}", slug(host)))
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
