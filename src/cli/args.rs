use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Sitepipe asset pipeline CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: sitepipe.toml)
    #[arg(short = 'C', long, default_value = "sitepipe.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build once, then watch sources and serve with live reload
    #[command(visible_alias = "d")]
    Dev,

    /// Run the full build pipeline (clean, all transforms, font linking)
    #[command(visible_alias = "b")]
    Build,

    /// Watch sources and serve the output directory (no initial build)
    #[command(visible_alias = "w")]
    Watch,

    /// Delete the output directory
    Clean,

    /// Transform plain markup files (src/html)
    Html,

    /// Render markup templates (src/templates)
    Templates,

    /// Compile and minify stylesheets (src/scss)
    Styles,

    /// Assemble and minify scripts (src/js)
    Scripts,

    /// Re-encode and optimize images (src/img)
    Images,

    /// Convert fonts to WOFF/WOFF2 (src/fonts)
    Fonts,

    /// Generate font-face directives into the fonts style partial
    FontsLink,

    /// Repackage OTF sources as TTF siblings (pre-conversion utility)
    FontsPrep,
}
