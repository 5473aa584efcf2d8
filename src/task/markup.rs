//! Markup transform tasks: plain html and template rendering.
//!
//! Both variants share the tail of the chain: rewrite raster `<img>`
//! references into `<picture>` elements with an AVIF source, collapse
//! whitespace, write to the output root.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context, path_loader};
use regex::Regex;

use super::{TaskContext, include};
use crate::debug;
use crate::utils::write_file;

/// Transform `src/html/*.html`: resolve includes, rewrite images, minify.
pub fn html_task(ctx: &TaskContext) -> Result<()> {
    let out_dir = ctx.paths.out_html();
    for source in ctx.paths.html_sources() {
        let markup = include::resolve_file(&source)?;
        let markup = minify_markup(&rewrite_pictures(&markup));

        let name = source.file_name().context("source without file name")?;
        write_file(&out_dir.join(name), markup.as_bytes())?;
        debug!("html"; "{}", source.display());
    }
    Ok(())
}

/// Render `src/templates/*.jinja` to html: partials are reachable through
/// `{% include %}`/`{% extends %}`, non-partials become output pages.
pub fn templates_task(ctx: &TaskContext) -> Result<()> {
    let sources = ctx.paths.template_sources();
    if sources.is_empty() {
        return Ok(());
    }

    let mut env = Environment::new();
    env.set_loader(path_loader(ctx.paths.templates_dir()));

    let out_dir = ctx.paths.out_html();
    for source in sources {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .context("template without file name")?;
        let rendered = env
            .get_template(name)?
            .render(context! {})
            .with_context(|| format!("failed to render {}", source.display()))?;
        let markup = minify_markup(&rewrite_pictures(&rendered));

        let stem = source.file_stem().context("template without stem")?;
        let out = out_dir.join(stem).with_extension("html");
        write_file(&out, markup.as_bytes())?;
        debug!("templates"; "{}", source.display());
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Picture rewriting
// ----------------------------------------------------------------------

static IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<img\b[^>]*\bsrc\s*=\s*(?:"([^"]+\.(?:png|jpe?g|webp))"|'([^']+\.(?:png|jpe?g|webp))')[^>]*/?>"#,
    )
    .unwrap()
});

/// Wrap raster `<img>` tags in `<picture>` with an AVIF `<source>`.
///
/// The image task always emits an `.avif` sibling for raster sources, so
/// the rewritten reference resolves after a full build. Images already
/// inside a `<picture>` element are left alone.
pub fn rewrite_pictures(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut last = 0;
    for caps in IMG_RE.captures_iter(markup) {
        let whole = caps.get(0).unwrap();
        out.push_str(&markup[last..whole.start()]);

        if inside_picture(&markup[..whole.start()]) {
            out.push_str(whole.as_str());
        } else {
            // exactly one of the quote-style groups participates
            let url = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            let avif = avif_ref(url);
            out.push_str(&format!(
                r#"<picture><source srcset="{avif}" type="image/avif">{}</picture>"#,
                whole.as_str()
            ));
        }
        last = whole.end();
    }
    out.push_str(&markup[last..]);
    out
}

/// Swap the url's extension for `.avif`, preserving any query/fragment-free path.
fn avif_ref(url: &str) -> String {
    match url.rfind('.') {
        Some(dot) => format!("{}.avif", &url[..dot]),
        None => url.to_string(),
    }
}

/// True when the preceding markup has an unclosed `<picture>` element.
fn inside_picture(before: &str) -> bool {
    before.matches("<picture").count() > before.matches("</picture").count()
}

// ----------------------------------------------------------------------
// Whitespace collapse
// ----------------------------------------------------------------------

static WS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static INTER_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());

/// Elements whose text content is whitespace-significant and must survive
/// the collapse untouched.
static PROTECTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<pre\b[^>]*>.*?</pre\s*>|<textarea\b[^>]*>.*?</textarea\s*>|<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>",
    )
    .unwrap()
});

/// Collapse whitespace runs and drop whitespace between tags, leaving
/// `<pre>`, `<textarea>`, `<script>` and `<style>` content alone.
pub fn minify_markup(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut last = 0;
    for protected in PROTECTED_RE.find_iter(markup) {
        out.push_str(&collapse(&markup[last..protected.start()]));
        out.push_str(protected.as_str());
        last = protected.end();
    }
    out.push_str(&collapse(&markup[last..]));
    out.trim().to_string()
}

fn collapse(markup: &str) -> String {
    let collapsed = WS_RUN_RE.replace_all(markup, " ");
    INTER_TAG_RE.replace_all(&collapsed, "><").to_string()
}
