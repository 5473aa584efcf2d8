//! Output directory removal.

use anyhow::{Context, Result};

use super::TaskContext;
use crate::debug;

/// Recursively remove the output directory. No-op when absent.
///
/// The build pipeline runs this to full completion before any transform
/// task writes, so stale artifacts never mix with fresh ones.
pub fn clean(ctx: &TaskContext) -> Result<()> {
    let out = ctx.paths.output_root();
    if !out.exists() {
        return Ok(());
    }
    std::fs::remove_dir_all(out)
        .with_context(|| format!("failed to remove {}", out.display()))?;
    debug!("clean"; "removed {}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::paths::PathTable;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_output_tree() {
        let temp = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.root = temp.path().to_path_buf();
        let paths = PathTable::new(&config);
        let ctx = TaskContext::new(&config, &paths);

        let stale = paths.out_css().join("old.css");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "stale").unwrap();

        clean(&ctx).unwrap();
        assert!(!paths.output_root().exists());

        // absent output dir is a no-op
        clean(&ctx).unwrap();
    }
}
