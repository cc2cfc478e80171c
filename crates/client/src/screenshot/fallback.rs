//! Placeholder screenshots.

use url::form_urlencoded;

use markcache_core::{Dimensions, ResolutionSource, ScreenshotResult, ThumbnailSizes, Thumbnails};

fn placeholder(size: Dimensions, text: &str) -> String {
    let text: String = form_urlencoded::byte_serialize(text.as_bytes()).collect();
    format!("https://placehold.co/{}x{}/png?text={text}", size.width, size.height)
}

/// Placeholder screenshot labelled with `host`.
///
/// `url` is the large placeholder. Without thumbnails all three sizes point
/// at it as well.
pub fn fallback_screenshot(host: &str, sizes: &ThumbnailSizes, generate_thumbnails: bool) -> ScreenshotResult {
    let url = placeholder(sizes.large, host);
    let thumbnails = if generate_thumbnails {
        Thumbnails {
            small: placeholder(sizes.small, host),
            medium: placeholder(sizes.medium, host),
            large: url.clone(),
        }
    } else {
        Thumbnails::uniform(&url)
    };

    ScreenshotResult { url, thumbnails, source: ResolutionSource::Fallback, cached: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_sizes() {
        let result = fallback_screenshot("example.com", &ThumbnailSizes::default(), true);
        assert_eq!(result.source, ResolutionSource::Fallback);
        assert!(!result.cached);
        assert_eq!(result.url, "https://placehold.co/1280x720/png?text=example.com");
        assert_eq!(result.thumbnails.small, "https://placehold.co/320x180/png?text=example.com");
        assert_eq!(result.thumbnails.medium, "https://placehold.co/640x360/png?text=example.com");
        assert_eq!(result.thumbnails.large, result.url);
    }

    #[test]
    fn test_without_thumbnails() {
        let result = fallback_screenshot("example.com", &ThumbnailSizes::default(), false);
        assert_eq!(result.thumbnails, Thumbnails::uniform(&result.url));
    }

    #[test]
    fn test_host_text_is_encoded() {
        let sizes = ThumbnailSizes { large: Dimensions::new(800, 600), ..Default::default() };
        let result = fallback_screenshot("bücher.de", &sizes, true);
        assert_eq!(result.url, "https://placehold.co/800x600/png?text=b%C3%BCcher.de");
    }
}
