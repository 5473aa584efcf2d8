//! Filesystem watching: map changed source paths to their asset class and
//! re-run that class's transform task in full.

mod debouncer;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, unbounded};
use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use crate::paths::PathTable;
use crate::task::{self, TaskContext, TaskKind};
use crate::{debug, log};
use debouncer::Debouncer;

/// Map a changed source path to the task that owns it.
///
/// Plain html watching is a config toggle (off by default - only the
/// template variant is watched for markup). Font sources are not watched;
/// conversion is a build-time step.
pub fn classify(path: &Path, paths: &PathTable, watch_html: bool) -> Option<TaskKind> {
    if path.starts_with(paths.templates_dir()) {
        Some(TaskKind::Templates)
    } else if path.starts_with(paths.scss_dir()) {
        Some(TaskKind::Styles)
    } else if path.starts_with(paths.js_dir()) {
        Some(TaskKind::Scripts)
    } else if path.starts_with(paths.img_dir()) {
        Some(TaskKind::Images)
    } else if watch_html && path.starts_with(paths.html_dir()) {
        Some(TaskKind::Html)
    } else {
        None
    }
}

/// Directories registered with the filesystem watcher.
fn watch_roots(paths: &PathTable, watch_html: bool) -> Vec<PathBuf> {
    let mut roots = vec![
        paths.templates_dir(),
        paths.scss_dir(),
        paths.js_dir(),
        paths.img_dir(),
    ];
    if watch_html {
        roots.push(paths.html_dir());
    }
    roots
}

/// Watch source trees and re-run tasks until shutdown (blocking).
pub fn run(ctx: &TaskContext, shutdown_rx: &Receiver<()>) -> Result<()> {
    let (tx, rx) = unbounded();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })
    .context("failed to create filesystem watcher")?;

    let watch_html = ctx.config.watch.html;
    for root in watch_roots(ctx.paths, watch_html) {
        if root.is_dir() {
            watcher
                .watch(&root, RecursiveMode::Recursive)
                .with_context(|| format!("failed to watch {}", root.display()))?;
            debug!("watch"; "watching {}", root.display());
        }
    }
    log!("watch"; "watching {}", ctx.paths.source_root().display());

    let mut debouncer = Debouncer::new();
    loop {
        if shutdown_rx.try_recv().is_ok() || crate::state::is_shutdown() {
            break;
        }

        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(Ok(event)) => debouncer.add_event(&event),
            Ok(Err(e)) => log!("watch"; "watcher error: {}", e),
            Err(crossbeam::channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
        }

        if let Some(changes) = debouncer.take_if_ready() {
            let kinds: FxHashSet<TaskKind> = changes
                .keys()
                .filter_map(|path| classify(path, ctx.paths, watch_html))
                .collect();
            for kind in kinds {
                debug!("watch"; "rebuilding {}", kind.label());
                task::run_watched(kind, ctx);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn make_table() -> PathTable {
        let mut config = PipelineConfig::default();
        config.root = PathBuf::from("/project");
        PathTable::new(&config)
    }

    #[test]
    fn test_classify_by_source_subtree() {
        let paths = make_table();
        let class = |p: &str| classify(Path::new(p), &paths, false);

        assert_eq!(class("/project/src/scss/style.scss"), Some(TaskKind::Styles));
        assert_eq!(class("/project/src/scss/_fonts.scss"), Some(TaskKind::Styles));
        assert_eq!(class("/project/src/js/lib/util.js"), Some(TaskKind::Scripts));
        assert_eq!(class("/project/src/img/a/b.png"), Some(TaskKind::Images));
        assert_eq!(
            class("/project/src/templates/index.jinja"),
            Some(TaskKind::Templates)
        );
        // fonts and unrelated paths are not watched
        assert_eq!(class("/project/src/fonts/Roboto.ttf"), None);
        assert_eq!(class("/project/README.md"), None);
    }

    #[test]
    fn test_classify_html_is_config_gated() {
        let paths = make_table();
        let page = Path::new("/project/src/html/index.html");
        assert_eq!(classify(page, &paths, false), None);
        assert_eq!(classify(page, &paths, true), Some(TaskKind::Html));
    }
}
