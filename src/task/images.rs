//! Image transform task.
//!
//! Raster sources (jpg/jpeg/png/webp) produce two artifacts: an `.avif`
//! re-encode (ravif) and an optimized copy in the original format (image).
//! SVG is compacted through usvg; gif/ico pass through verbatim. The
//! source tree under `src/img/` is preserved in the output.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use ravif::{Encoder, Img, RGBA8};
use rayon::prelude::*;

use super::TaskContext;
use crate::debug;
use crate::utils::{read_bytes, with_ext, write_file};

/// Re-encode every image source into the output tree.
pub fn images_task(ctx: &TaskContext) -> Result<()> {
    let img_dir = ctx.paths.img_dir();
    let out_dir = ctx.paths.out_img();
    let sources = ctx.paths.image_sources();

    sources.par_iter().try_for_each(|source| {
        let rel = source
            .strip_prefix(&img_dir)
            .with_context(|| format!("image outside source tree: {}", source.display()))?;
        let out = out_dir.join(rel);
        process_image(ctx, source, &out)
    })
}

/// Transform a single source image into its output artifact(s).
fn process_image(ctx: &TaskContext, source: &Path, out: &Path) -> Result<()> {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "webp" => {
            let img = image::open(source)
                .with_context(|| format!("failed to decode {}", source.display()))?;

            let avif = encode_avif(&img, ctx.config.image.avif_quality)?;
            write_file(&with_ext(out, "avif"), &avif)?;

            let optimized = reencode_original(&img, &ext, source, ctx.config.image.jpeg_quality)?;
            write_file(out, &optimized)?;
        }
        "svg" => {
            let data = read_bytes(source)?;
            write_file(out, &optimize_svg(&data)?)?;
        }
        // gif/ico: no re-encoder in the stack, pass through
        _ => {
            write_file(out, &read_bytes(source)?)?;
        }
    }

    debug!("images"; "{}", source.display());
    Ok(())
}

/// Encode a decoded image as AVIF at the configured quality.
fn encode_avif(img: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<RGBA8> = rgba
        .pixels()
        .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
        .collect();

    let encoded = Encoder::new()
        .with_quality(quality)
        .with_alpha_quality(quality)
        .with_speed(6)
        .encode_rgba(Img::new(
            pixels.as_slice(),
            width as usize,
            height as usize,
        ))
        .map_err(|e| anyhow!("avif encode failed: {e}"))?;
    Ok(encoded.avif_file)
}

/// Re-encode the image in its original format with tighter settings.
///
/// WebP sources are copied verbatim: the stack's webp support is
/// decode-only (lossless re-encode would grow the file).
fn reencode_original(
    img: &DynamicImage,
    ext: &str,
    source: &Path,
    jpeg_quality: u8,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match ext {
        "png" => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
                .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                .with_context(|| format!("failed to re-encode {}", source.display()))?;
        }
        "jpg" | "jpeg" => {
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality)
                .encode_image(img)
                .with_context(|| format!("failed to re-encode {}", source.display()))?;
        }
        _ => return read_bytes(source),
    }
    Ok(buf)
}

/// Compact an SVG by parsing and re-serializing it without indentation.
fn optimize_svg(data: &[u8]) -> Result<Vec<u8>> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .context("failed to parse SVG")?;
    let compact = tree.to_string(&usvg::WriteOptions {
        indent: usvg::Indent::None,
        ..usvg::WriteOptions::default()
    });
    Ok(compact.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::paths::PathTable;
    use tempfile::TempDir;

    #[test]
    fn test_gif_passthrough_preserves_tree() {
        let temp = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.root = temp.path().to_path_buf();
        let paths = PathTable::new(&config);

        let nested = paths.img_dir().join("icons");
        std::fs::create_dir_all(&nested).unwrap();
        // GIF89a header is enough for a passthrough copy
        std::fs::write(nested.join("dot.gif"), b"GIF89a").unwrap();

        let ctx = TaskContext::new(&config, &paths);
        images_task(&ctx).unwrap();

        let out = paths.out_img().join("icons/dot.gif");
        assert_eq!(std::fs::read(out).unwrap(), b"GIF89a");
    }

    #[test]
    fn test_optimize_svg_compacts() {
        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10\" height=\"10\">\n    <rect width=\"10\" height=\"10\" fill=\"#f00\"/>\n</svg>\n";
        let out = optimize_svg(svg).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<svg"));
        assert!(!text.contains('\n'));
    }
}
