//! `@@include('file')` directive resolution for markup and script sources.
//!
//! Included paths are resolved relative to the including file, and may
//! themselves contain directives. Include depth is capped to turn cycles
//! into errors instead of unbounded recursion.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::utils::read_to_string;

static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@@include\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

const MAX_DEPTH: usize = 16;

/// Resolve all include directives in `source`, relative to `base` (the
/// directory of the file the source was read from).
pub fn resolve(source: &str, base: &Path) -> Result<String> {
    resolve_at_depth(source, base, 0)
}

/// Read a file and resolve its include directives.
pub fn resolve_file(path: &Path) -> Result<String> {
    let source = read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    resolve(&source, base)
}

fn resolve_at_depth(source: &str, base: &Path, depth: usize) -> Result<String> {
    if depth > MAX_DEPTH {
        bail!("include depth exceeded {MAX_DEPTH} (include cycle?)");
    }
    if !source.contains("@@include") {
        return Ok(source.to_string());
    }

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for caps in INCLUDE_RE.captures_iter(source) {
        let whole = caps.get(0).unwrap();
        let target = base.join(&caps[1]);

        out.push_str(&source[last..whole.start()]);
        let included = read_to_string(&target)
            .with_context(|| format!("unresolved include `{}`", &caps[1]))?;
        let nested_base = target.parent().unwrap_or(base);
        out.push_str(&resolve_at_depth(&included, nested_base, depth + 1)?);
        last = whole.end();
    }
    out.push_str(&source[last..]);
    Ok(out)
}
