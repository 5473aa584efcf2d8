//! MIME type detection for the dev server.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";

    pub const OCTET_STREAM: &str = "application/octet-stream";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const AVIF: &str = "image/avif";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OTF: &str = "font/otf";
}

/// Guess MIME type from file extension.
///
/// Returns a full MIME type string suitable for HTTP Content-Type header.
pub fn from_path(path: &Path) -> &'static str {
    from_extension(path.extension().and_then(|e| e.to_str()))
}

/// Guess MIME type from file extension string.
pub fn from_extension(ext: Option<&str>) -> &'static str {
    use types::*;
    match ext.map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("html" | "htm") => HTML,
        Some("txt") => PLAIN,
        Some("css") => CSS,
        Some("js" | "mjs") => JAVASCRIPT,
        Some("json") => JSON,
        Some("xml") => XML,
        Some("png") => PNG,
        Some("jpg" | "jpeg") => JPEG,
        Some("gif") => GIF,
        Some("webp") => WEBP,
        Some("avif") => AVIF,
        Some("svg") => SVG,
        Some("ico") => ICO,
        Some("woff") => WOFF,
        Some("woff2") => WOFF2,
        Some("ttf") => TTF,
        Some("otf") => OTF,
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(from_path(Path::new("build/css/style.min.css")), types::CSS);
        assert_eq!(from_path(Path::new("build/fonts/Roboto.woff2")), types::WOFF2);
        assert_eq!(from_path(Path::new("build/img/hero.avif")), types::AVIF);
        assert_eq!(from_path(Path::new("build/unknown.bin")), types::OCTET_STREAM);
    }
}
