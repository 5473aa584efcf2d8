//! Per-asset-class transform tasks.
//!
//! Every task follows the same contract: select sources from the path
//! table, run a fixed chain of transformations, write expanded and (where
//! applicable) `.min` artifacts under the output root, then signal the
//! live-reload hub. The first error aborts the task and propagates to the
//! orchestrator; artifacts already written stay on disk.

pub mod clean;
pub mod fonts;
pub mod images;
mod include;
pub mod markup;
pub mod scripts;
pub mod styles;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::config::PipelineConfig;
use crate::paths::PathTable;
use crate::server::reload::ReloadHub;
use crate::{debug, log};

/// The asset classes with a transform task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Html,
    Templates,
    Styles,
    Scripts,
    Images,
    Fonts,
}

impl TaskKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Templates => "templates",
            Self::Styles => "styles",
            Self::Scripts => "scripts",
            Self::Images => "images",
            Self::Fonts => "fonts",
        }
    }
}

/// Shared state handed to every task.
#[derive(Clone)]
pub struct TaskContext<'a> {
    pub config: &'a PipelineConfig,
    pub paths: &'a PathTable,
    /// Present in watch mode; tasks signal it after writing.
    pub reload: Option<Arc<ReloadHub>>,
}

impl<'a> TaskContext<'a> {
    pub fn new(config: &'a PipelineConfig, paths: &'a PathTable) -> Self {
        Self {
            config,
            paths,
            reload: None,
        }
    }

    pub fn with_reload(mut self, hub: Arc<ReloadHub>) -> Self {
        self.reload = Some(hub);
        self
    }

    /// Signal connected browsers after a task wrote its artifacts.
    ///
    /// Style changes inject in place; everything else reloads the page.
    fn signal_reload(&self, kind: TaskKind) {
        let Some(hub) = &self.reload else { return };
        match kind {
            TaskKind::Styles => hub.refresh_css("css/style.css"),
            _ => hub.reload(kind.label()),
        }
    }
}

/// Run one transform task to completion and signal live reload.
pub fn run(kind: TaskKind, ctx: &TaskContext) -> Result<()> {
    let start = Instant::now();
    match kind {
        TaskKind::Html => markup::html_task(ctx)?,
        TaskKind::Templates => markup::templates_task(ctx)?,
        TaskKind::Styles => styles::styles_task(ctx)?,
        TaskKind::Scripts => scripts::scripts_task(ctx)?,
        TaskKind::Images => images::images_task(ctx)?,
        TaskKind::Fonts => fonts::fonts_task(ctx)?,
    }
    debug!(kind.label(); "done in {:.0?}", start.elapsed());
    ctx.signal_reload(kind);
    Ok(())
}

/// Run a task from the watch loop, reporting outcome on the status line
/// instead of aborting the process.
pub fn run_watched(kind: TaskKind, ctx: &TaskContext) {
    match run(kind, ctx) {
        Ok(()) => crate::logger::status_success(kind.label()),
        Err(e) => {
            log!("error"; "{} task failed", kind.label());
            crate::logger::status_error(kind.label(), &format!("{e:#}"));
        }
    }
}
