//! The orchestrator: composes tasks into the named pipelines.
//!
//! Two combinators only: sequential steps (each completes before the next
//! starts) and concurrent groups (rayon; completion is the completion of
//! all members, which write disjoint output subtrees by construction).

use std::time::Instant;

use anyhow::Result;
use rayon::prelude::*;

use crate::log;
use crate::server::{DevServer, open_browser, reload::ReloadHub};
use crate::task::{self, TaskContext, TaskKind};
use crate::watch as watcher;

/// Transform tasks that run concurrently inside the build pipeline.
///
/// Plain html is deliberately absent: it is invocable only through its own
/// subcommand, and markup in the build set comes from the template task.
const BUILD_TASKS: &[TaskKind] = &[
    TaskKind::Templates,
    TaskKind::Styles,
    TaskKind::Scripts,
    TaskKind::Images,
    TaskKind::Fonts,
];

/// One-shot build: clean, all transforms concurrently, then font linking.
///
/// The clean fully completes before any transform writes; the font-style
/// linker only runs after every converted font is on disk.
pub fn build(ctx: &TaskContext) -> Result<()> {
    let start = Instant::now();
    log!("build"; "{} -> {}",
        ctx.paths.source_root().display(),
        ctx.paths.output_root().display());

    task::clean::clean(ctx)?;
    concurrent(ctx, BUILD_TASKS)?;
    task::fonts::link_fonts_style(ctx)?;

    log!("build"; "done in {:.1?}", start.elapsed());
    Ok(())
}

/// Watch pipeline: file watchers and the live-reload server together,
/// serving whatever is currently in the output directory.
pub fn watch(ctx: &TaskContext) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = crossbeam::channel::unbounded::<()>();

    let hub = ReloadHub::start(ctx.config.serve.ws_port)?;
    let server = DevServer::bind(ctx.config, hub.port(), shutdown_tx)?;
    if ctx.config.serve.open {
        open_browser(&server.addr());
    }

    let watch_ctx = ctx.clone().with_reload(hub);
    std::thread::scope(|scope| {
        scope.spawn(move || server.run());
        let result = watcher::run(&watch_ctx, &shutdown_rx);
        // The server thread may still be blocked on incoming requests;
        // unblock it so the scope can join and the error can propagate.
        crate::state::request_shutdown();
        result
    })
}

/// Default pipeline: build fully, then start watching and serving, so a
/// build artifact exists before the first request.
pub fn dev(ctx: &TaskContext) -> Result<()> {
    build(ctx)?;
    watch(ctx)
}

/// Run a group of tasks concurrently; the group completes when all members
/// have settled, and the first error propagates.
fn concurrent(ctx: &TaskContext, kinds: &[TaskKind]) -> Result<()> {
    let results: Vec<Result<()>> = kinds.par_iter().map(|kind| task::run(*kind, ctx)).collect();
    results.into_iter().collect::<Result<Vec<()>>>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::paths::PathTable;
    use tempfile::TempDir;

    fn fixture_site(temp: &TempDir) -> (PipelineConfig, PathTable) {
        let mut config = PipelineConfig::default();
        config.root = temp.path().to_path_buf();
        let paths = PathTable::new(&config);

        std::fs::create_dir_all(paths.templates_dir()).unwrap();
        std::fs::write(paths.templates_dir().join("index.jinja"), "<p>hi</p>").unwrap();
        std::fs::create_dir_all(paths.scss_dir()).unwrap();
        std::fs::write(paths.style_entry(), "body { color: #000; }\n").unwrap();
        std::fs::write(paths.fonts_partial(), "").unwrap();
        std::fs::create_dir_all(paths.js_dir()).unwrap();
        std::fs::write(paths.script_entry(), "console.log('hi');\n").unwrap();

        (config, paths)
    }

    #[test]
    fn test_build_replaces_stale_output() {
        let temp = TempDir::new().unwrap();
        let (config, paths) = fixture_site(&temp);
        let ctx = TaskContext::new(&config, &paths);

        // pre-populate output with a stale artifact
        std::fs::create_dir_all(paths.output_root()).unwrap();
        std::fs::write(paths.output_root().join("stale.html"), "old").unwrap();

        build(&ctx).unwrap();

        assert!(!paths.output_root().join("stale.html").exists());
        assert!(paths.output_root().join("index.html").is_file());
        assert!(paths.out_css().join("style.css").is_file());
        assert!(paths.out_css().join("style.min.css").is_file());
        assert!(paths.out_js().join("script.js").is_file());
        assert!(paths.out_js().join("script.min.js").is_file());
    }

    #[test]
    fn test_build_leaves_plain_html_to_its_own_task() {
        let temp = TempDir::new().unwrap();
        let (config, paths) = fixture_site(&temp);
        let ctx = TaskContext::new(&config, &paths);

        std::fs::create_dir_all(paths.html_dir()).unwrap();
        std::fs::write(paths.html_dir().join("about.html"), "<p>about</p>").unwrap();

        build(&ctx).unwrap();
        assert!(!paths.output_root().join("about.html").exists());

        task::run(TaskKind::Html, &ctx).unwrap();
        assert!(paths.output_root().join("about.html").is_file());
    }

    #[test]
    fn test_build_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let (config, paths) = fixture_site(&temp);
        let ctx = TaskContext::new(&config, &paths);

        build(&ctx).unwrap();
        let first = std::fs::read(paths.out_css().join("style.min.css")).unwrap();
        build(&ctx).unwrap();
        let second = std::fs::read(paths.out_css().join("style.min.css")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_minified_not_larger_than_expanded() {
        let temp = TempDir::new().unwrap();
        let (config, paths) = fixture_site(&temp);
        let ctx = TaskContext::new(&config, &paths);

        build(&ctx).unwrap();

        let css = std::fs::metadata(paths.out_css().join("style.css")).unwrap().len();
        let css_min = std::fs::metadata(paths.out_css().join("style.min.css")).unwrap().len();
        assert!(css_min <= css);

        let js = std::fs::metadata(paths.out_js().join("script.js")).unwrap().len();
        let js_min = std::fs::metadata(paths.out_js().join("script.min.js")).unwrap().len();
        assert!(js_min <= js);
    }

    #[test]
    fn test_concurrent_matches_sequential_output() {
        let temp_a = TempDir::new().unwrap();
        let (config_a, paths_a) = fixture_site(&temp_a);
        let ctx_a = TaskContext::new(&config_a, &paths_a);
        concurrent(&ctx_a, BUILD_TASKS).unwrap();

        let temp_b = TempDir::new().unwrap();
        let (config_b, paths_b) = fixture_site(&temp_b);
        let ctx_b = TaskContext::new(&config_b, &paths_b);
        for kind in BUILD_TASKS {
            task::run(*kind, &ctx_b).unwrap();
        }

        for rel in ["index.html", "css/style.css", "css/style.min.css", "js/script.min.js"] {
            let a = std::fs::read(paths_a.output_root().join(rel)).unwrap();
            let b = std::fs::read(paths_b.output_root().join(rel)).unwrap();
            assert_eq!(a, b, "artifact {rel} differs between compositions");
        }
    }
}
