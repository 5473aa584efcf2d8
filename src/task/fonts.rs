//! Font conversion, the font-style linker, and the OTF pre-conversion
//! utility.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;

use super::TaskContext;
use crate::utils::{read_bytes, with_ext, write_file};
use crate::{debug, log};

/// Convert every `src/fonts/*.ttf` into WOFF and WOFF2 artifacts.
pub fn fonts_task(ctx: &TaskContext) -> Result<()> {
    let out_dir = ctx.paths.out_fonts();
    for source in ctx.paths.font_sources() {
        let data = read_bytes(&source)?;
        let name = source.file_name().context("font without file name")?;
        let out = out_dir.join(name);

        let woff1 = woff::version1::compress(&data, 1, 0)
            .ok_or_else(|| anyhow!("woff conversion failed for {}", source.display()))?;
        write_file(&with_ext(&out, "woff"), &woff1)?;

        let woff2 = woff::version2::compress(&data, String::new(), 11, true)
            .ok_or_else(|| anyhow!("woff2 conversion failed for {}", source.display()))?;
        write_file(&with_ext(&out, "woff2"), &woff2)?;

        debug!("fonts"; "{}", source.display());
    }
    Ok(())
}

/// Guards the check-then-append on the fonts partial against concurrent
/// pipeline runs in the same process.
static LINK_GUARD: Mutex<()> = Mutex::new(());

/// Generate `@include font-face(...)` directives into the fonts partial.
///
/// The partial is only written while empty; a non-empty file is treated as
/// already linked and left alone regardless of the font directory's
/// contents. One directive per unique family name (the stem before the
/// first `.` of each converted font file), in sorted order.
pub fn link_fonts_style(ctx: &TaskContext) -> Result<()> {
    let _guard = LINK_GUARD.lock();

    let partial = ctx.paths.fonts_partial();
    if !partial.exists() {
        write_file(&partial, b"")?;
    }
    let current = fs::read_to_string(&partial)
        .with_context(|| format!("failed to read {}", partial.display()))?;
    if !current.is_empty() {
        debug!("fonts"; "{} already linked", partial.display());
        return Ok(());
    }

    let families = font_families(&ctx.paths.out_fonts())?;
    if families.is_empty() {
        return Ok(());
    }

    let mut directives = String::new();
    for family in &families {
        directives.push_str(&format!(
            "@include font-face(\"{family}\", \"{family}\", \"400\", \"normal\");\n"
        ));
    }
    write_file(&partial, directives.as_bytes())?;
    log!("fonts"; "linked {} font famil{}", families.len(), if families.len() == 1 { "y" } else { "ies" });
    Ok(())
}

/// Unique family names in the converted font directory, sorted.
///
/// The family is the file name up to the first extension separator, so
/// `Roboto.woff` and `Roboto.woff2` collapse to one entry.
fn font_families(dir: &Path) -> Result<BTreeSet<String>> {
    let mut families = BTreeSet::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(families);
    };
    for entry in entries.filter_map(Result::ok) {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(family) = name.split('.').next()
            && !family.is_empty()
        {
            families.insert(family.to_string());
        }
    }
    Ok(families)
}

/// Repackage `src/fonts/*.otf` as `.ttf` siblings.
///
/// OTF files are already sfnt containers, which the WOFF compressors
/// accept as-is; only the extension changes.
pub fn prep_otf(ctx: &TaskContext) -> Result<()> {
    for source in ctx.paths.otf_sources() {
        let data = read_bytes(&source)?;
        write_file(&with_ext(&source, "ttf"), &data)?;
        log!("fonts"; "repackaged {}", source.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::paths::PathTable;
    use tempfile::TempDir;

    fn make_ctx(temp: &TempDir) -> (PipelineConfig, PathTable) {
        let mut config = PipelineConfig::default();
        config.root = temp.path().to_path_buf();
        let paths = PathTable::new(&config);
        (config, paths)
    }

    #[test]
    fn test_linker_writes_one_directive_per_family() {
        let temp = TempDir::new().unwrap();
        let (config, paths) = make_ctx(&temp);
        let ctx = TaskContext::new(&config, &paths);

        std::fs::create_dir_all(paths.fonts_partial().parent().unwrap()).unwrap();
        std::fs::write(paths.fonts_partial(), "").unwrap();

        let out = paths.out_fonts();
        std::fs::create_dir_all(&out).unwrap();
        for name in ["OpenSans.woff", "OpenSans.woff2", "Roboto.woff", "Roboto.woff2"] {
            std::fs::write(out.join(name), b"stub").unwrap();
        }

        link_fonts_style(&ctx).unwrap();
        let content = std::fs::read_to_string(paths.fonts_partial()).unwrap();
        assert_eq!(
            content,
            "@include font-face(\"OpenSans\", \"OpenSans\", \"400\", \"normal\");\n\
             @include font-face(\"Roboto\", \"Roboto\", \"400\", \"normal\");\n"
        );
    }

    #[test]
    fn test_linker_skips_non_empty_partial() {
        let temp = TempDir::new().unwrap();
        let (config, paths) = make_ctx(&temp);
        let ctx = TaskContext::new(&config, &paths);

        std::fs::create_dir_all(paths.fonts_partial().parent().unwrap()).unwrap();
        std::fs::write(paths.fonts_partial(), "// hand-written\n").unwrap();

        let out = paths.out_fonts();
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("Roboto.woff"), b"stub").unwrap();

        link_fonts_style(&ctx).unwrap();
        assert_eq!(
            std::fs::read_to_string(paths.fonts_partial()).unwrap(),
            "// hand-written\n"
        );
    }

    #[test]
    fn test_linker_creates_missing_partial() {
        let temp = TempDir::new().unwrap();
        let (config, paths) = make_ctx(&temp);
        let ctx = TaskContext::new(&config, &paths);

        // no fonts converted yet: partial is created empty, nothing appended
        link_fonts_style(&ctx).unwrap();
        assert_eq!(std::fs::read_to_string(paths.fonts_partial()).unwrap(), "");

        // second run is still a no-op
        link_fonts_style(&ctx).unwrap();
        assert_eq!(std::fs::read_to_string(paths.fonts_partial()).unwrap(), "");
    }

    #[test]
    fn test_prep_otf_repackages_extension() {
        let temp = TempDir::new().unwrap();
        let (config, paths) = make_ctx(&temp);
        let ctx = TaskContext::new(&config, &paths);

        std::fs::create_dir_all(paths.fonts_dir()).unwrap();
        std::fs::write(paths.fonts_dir().join("Custom.otf"), b"OTTO").unwrap();

        prep_otf(&ctx).unwrap();
        assert_eq!(
            std::fs::read(paths.fonts_dir().join("Custom.ttf")).unwrap(),
            b"OTTO"
        );
    }
}
