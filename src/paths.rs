//! The path table: which files each asset class reads and where it writes.
//!
//! Pure data derived from the config once at startup; immutable for the
//! process lifetime. Sources live under the source root, artifacts under
//! the output root:
//!
//! ```text
//! src/html/*.html        -> build/*.html
//! src/templates/*.jinja  -> build/*.html
//! src/scss/style.scss    -> build/css/style[.min].css
//! src/js/script.js       -> build/js/script[.min].js
//! src/img/**/*           -> build/img/** (tree preserved)
//! src/fonts/*.ttf        -> build/fonts/*.woff[2]
//! ```

use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;

/// Files whose name starts with this prefix are partials/includes and never
/// produce standalone output.
pub const PARTIAL_PREFIX: char = '_';

/// Raster and vector extensions the image task picks up.
pub const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "svg", "gif", "ico", "webp"];

/// Static mapping from asset classes to source/output locations.
#[derive(Debug, Clone)]
pub struct PathTable {
    src_root: PathBuf,
    out_root: PathBuf,
}

impl PathTable {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            src_root: config.source_dir(),
            out_root: config.output_dir(),
        }
    }

    /// Output root (`build/`).
    pub fn output_root(&self) -> &Path {
        &self.out_root
    }

    /// Source root (`src/`).
    pub fn source_root(&self) -> &Path {
        &self.src_root
    }

    // ------------------------------------------------------------------
    // Per-class source locations
    // ------------------------------------------------------------------

    pub fn html_dir(&self) -> PathBuf {
        self.src_root.join("html")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.src_root.join("templates")
    }

    pub fn scss_dir(&self) -> PathBuf {
        self.src_root.join("scss")
    }

    /// Stylesheet entry point; `_*.scss` partials are reachable only via it.
    pub fn style_entry(&self) -> PathBuf {
        self.scss_dir().join("style.scss")
    }

    /// The fonts style partial the linker appends to.
    pub fn fonts_partial(&self) -> PathBuf {
        self.scss_dir().join("_fonts.scss")
    }

    pub fn js_dir(&self) -> PathBuf {
        self.src_root.join("js")
    }

    /// Script entry point; includes are resolved relative to it.
    pub fn script_entry(&self) -> PathBuf {
        self.js_dir().join("script.js")
    }

    pub fn img_dir(&self) -> PathBuf {
        self.src_root.join("img")
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.src_root.join("fonts")
    }

    // ------------------------------------------------------------------
    // Per-class output directories
    // ------------------------------------------------------------------

    /// Markup lands at the output root itself.
    pub fn out_html(&self) -> PathBuf {
        self.out_root.clone()
    }

    pub fn out_css(&self) -> PathBuf {
        self.out_root.join("css")
    }

    pub fn out_js(&self) -> PathBuf {
        self.out_root.join("js")
    }

    pub fn out_img(&self) -> PathBuf {
        self.out_root.join("img")
    }

    pub fn out_fonts(&self) -> PathBuf {
        self.out_root.join("fonts")
    }

    // ------------------------------------------------------------------
    // Source selection
    // ------------------------------------------------------------------

    /// Non-partial `*.html` sources, sorted by name.
    pub fn html_sources(&self) -> Vec<PathBuf> {
        list_sources(&self.html_dir(), &["html"])
    }

    /// Non-partial `*.jinja` sources, sorted by name.
    pub fn template_sources(&self) -> Vec<PathBuf> {
        list_sources(&self.templates_dir(), &["jinja"])
    }

    /// All image sources under `src/img/`, recursively, sorted by path.
    pub fn image_sources(&self) -> Vec<PathBuf> {
        let dir = self.img_dir();
        if !dir.is_dir() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = jwalk::WalkDir::new(&dir)
            .skip_hidden(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path())
            .filter(|p| has_ext(p, IMAGE_EXTS) && !is_partial(p))
            .collect();
        files.sort();
        files
    }

    /// `*.ttf` font sources, sorted by name.
    pub fn font_sources(&self) -> Vec<PathBuf> {
        list_sources(&self.fonts_dir(), &["ttf"])
    }

    /// `*.otf` sources for the pre-conversion utility.
    pub fn otf_sources(&self) -> Vec<PathBuf> {
        list_sources(&self.fonts_dir(), &["otf"])
    }
}

/// True when the file name starts with the partial prefix.
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(PARTIAL_PREFIX))
}

/// True when the extension (lowercased) is one of `exts`.
pub fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.contains(&e.to_ascii_lowercase().as_str()))
}

/// Flat, sorted listing of non-partial files with one of the extensions.
fn list_sources(dir: &Path, exts: &[&str]) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_ext(p, exts) && !is_partial(p))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use tempfile::TempDir;

    fn make_table(root: &Path) -> PathTable {
        let mut config = PipelineConfig::default();
        config.root = root.to_path_buf();
        PathTable::new(&config)
    }

    #[test]
    fn test_layout() {
        let table = make_table(Path::new("/project"));
        assert_eq!(table.style_entry(), Path::new("/project/src/scss/style.scss"));
        assert_eq!(table.out_css(), Path::new("/project/build/css"));
        assert_eq!(table.out_html(), Path::new("/project/build"));
    }

    #[test]
    fn test_partials_excluded_from_sources() {
        let temp = TempDir::new().unwrap();
        let html = temp.path().join("src/html");
        std::fs::create_dir_all(&html).unwrap();
        std::fs::write(html.join("index.html"), "<p>hi</p>").unwrap();
        std::fs::write(html.join("_header.html"), "<header/>").unwrap();
        std::fs::write(html.join("notes.txt"), "skip").unwrap();

        let table = make_table(temp.path());
        let sources = table.html_sources();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].ends_with("index.html"));
    }

    #[test]
    fn test_is_partial() {
        assert!(is_partial(Path::new("src/scss/_fonts.scss")));
        assert!(!is_partial(Path::new("src/scss/style.scss")));
    }
}
