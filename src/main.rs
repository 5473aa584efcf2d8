//! Sitepipe - a static-site asset build pipeline.
//!
//! Transforms markup templates, stylesheets, scripts, images and fonts from
//! `src/` into a deployable `build/` tree, and serves the result locally
//! with live reload in watch mode.

mod cli;
mod config;
mod logger;
mod paths;
mod pipeline;
mod server;
mod state;
mod task;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::PipelineConfig;
use paths::PathTable;
use task::TaskContext;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    state::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = PipelineConfig::load(&cli)?;
    let paths = PathTable::new(&config);
    let ctx = TaskContext::new(&config, &paths);

    match &cli.command {
        Commands::Dev => pipeline::dev(&ctx),
        Commands::Build => pipeline::build(&ctx),
        Commands::Watch => pipeline::watch(&ctx),
        Commands::Clean => task::clean::clean(&ctx),
        Commands::Html => task::run(task::TaskKind::Html, &ctx),
        Commands::Templates => task::run(task::TaskKind::Templates, &ctx),
        Commands::Styles => task::run(task::TaskKind::Styles, &ctx),
        Commands::Scripts => task::run(task::TaskKind::Scripts, &ctx),
        Commands::Images => task::run(task::TaskKind::Images, &ctx),
        Commands::Fonts => task::run(task::TaskKind::Fonts, &ctx),
        Commands::FontsLink => task::fonts::link_fonts_style(&ctx),
        Commands::FontsPrep => task::fonts::prep_otf(&ctx),
    }
}
