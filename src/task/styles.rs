//! Stylesheet transform task.
//!
//! Chain: grass (scss -> expanded css) -> raster url() references rewritten
//! to `.avif` -> lightningcss (vendor prefixes for the browser targets,
//! rule merging) -> expanded artifact -> minified artifact.

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::Regex;

use super::TaskContext;
use crate::debug;
use crate::utils::{min_path, write_file};

/// Compile the stylesheet entry and write expanded + minified artifacts.
pub fn styles_task(ctx: &TaskContext) -> Result<()> {
    let entry = ctx.paths.style_entry();
    if !entry.is_file() {
        return Ok(());
    }

    let css = grass::from_path(
        &entry,
        &grass::Options::default().style(grass::OutputStyle::Expanded),
    )
    .map_err(|e| anyhow!("scss compilation failed: {e}"))?;
    let css = rewrite_image_refs(&css);

    let (expanded, minified) = prefix_and_minify(&css)?;

    let out = ctx.paths.out_css().join("style.css");
    write_file(&out, expanded.as_bytes())?;
    write_file(&min_path(&out), minified.as_bytes())?;
    debug!("styles"; "{} ({} -> {} bytes minified)", entry.display(), expanded.len(), minified.len());
    Ok(())
}

/// Run css through lightningcss once, printing both forms.
///
/// The minify pass applies the browser targets (prefixing) and merges
/// rules, so both outputs carry the prefixes.
fn prefix_and_minify(css: &str) -> Result<(String, String)> {
    let targets = browser_targets();

    let mut sheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| anyhow!("css parse failed: {e}"))?;
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| anyhow!("css transform failed: {e}"))?;

    let expanded = sheet
        .to_css(PrinterOptions {
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("css print failed: {e}"))?
        .code;
    let minified = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("css print failed: {e}"))?
        .code;

    Ok((expanded, minified))
}

/// Browser support window used for vendor prefixing.
///
/// Versions are encoded as `major << 16 | minor << 8 | patch`.
fn browser_targets() -> Targets {
    Targets::from(Browsers {
        chrome: Some(90 << 16),
        edge: Some(90 << 16),
        firefox: Some(78 << 16),
        safari: Some(12 << 16),
        ios_saf: Some(12 << 16),
        ..Browsers::default()
    })
}

static CSS_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(['"]?)([^'")]+)\.(png|jpe?g|webp)(['"]?)\s*\)"#).unwrap()
});

/// Rewrite raster `url()` references to the `.avif` siblings the image
/// task emits.
pub fn rewrite_image_refs(css: &str) -> String {
    CSS_IMG_RE
        .replace_all(css, |caps: &regex::Captures| {
            format!("url({}{}.avif{})", &caps[1], &caps[2], &caps[4])
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_image_refs() {
        let css = r#".hero { background: url("../img/bg.jpg") no-repeat; }"#;
        assert_eq!(
            rewrite_image_refs(css),
            r#".hero { background: url("../img/bg.avif") no-repeat; }"#
        );
        // non-raster refs untouched
        let svg = ".icon { background: url(../img/icon.svg); }";
        assert_eq!(rewrite_image_refs(svg), svg);
    }

    #[test]
    fn test_prefix_and_minify() {
        let (expanded, minified) =
            prefix_and_minify(".a {\n  color: #ff0000;\n}\n.b {\n  color: #ff0000;\n}\n").unwrap();
        assert!(minified.len() <= expanded.len());
        assert!(!minified.contains('\n'));
    }

    #[test]
    fn test_minify_is_deterministic() {
        let css = ".x { user-select: none; }";
        assert_eq!(prefix_and_minify(css).unwrap(), prefix_and_minify(css).unwrap());
    }
}
