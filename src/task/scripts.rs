//! Script transform task.
//!
//! Chain: resolve `@@include` directives -> down-level for the supported
//! browser window -> expanded artifact -> oxc minify (parse, compress,
//! mangle, codegen) -> minified artifact.

use std::path::Path;

use anyhow::{Result, anyhow, bail};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};

use super::{TaskContext, include};
use crate::debug;
use crate::utils::{min_path, write_file};

/// Syntax floor for the expanded artifact, matching the stylesheet
/// task's browser window (Safari 12 era).
const SCRIPT_TARGET: &str = "es2018";

/// Assemble the script entry and write expanded + minified artifacts.
pub fn scripts_task(ctx: &TaskContext) -> Result<()> {
    let entry = ctx.paths.script_entry();
    if !entry.is_file() {
        return Ok(());
    }

    let source = include::resolve_file(&entry)?;
    let expanded = transpile_js(&source)?;
    let minified = minify_js(&expanded)?;

    let out = ctx.paths.out_js().join("script.js");
    write_file(&out, expanded.as_bytes())?;
    write_file(&min_path(&out), minified.as_bytes())?;
    debug!("scripts"; "{} ({} -> {} bytes minified)", entry.display(), expanded.len(), minified.len());
    Ok(())
}

/// Down-level JavaScript to the configured syntax target.
pub fn transpile_js(source: &str) -> Result<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        let first = &ret.errors[0];
        bail!("script parse failed: {first}");
    }
    let mut program = ret.program;

    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();
    let options = TransformOptions::from_target(SCRIPT_TARGET)
        .map_err(|e| anyhow!("invalid script target: {e}"))?;
    let ret = Transformer::new(&allocator, Path::new("script.js"), &options)
        .build_with_scoping(scoping, &mut program);
    if !ret.errors.is_empty() {
        let first = &ret.errors[0];
        bail!("script transform failed: {first}");
    }

    Ok(Codegen::new().build(&program).code)
}

/// Minify JavaScript source code.
pub fn minify_js(source: &str) -> Result<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        let first = &ret.errors[0];
        bail!("script parse failed: {first}");
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_is_smaller_and_stable() {
        let source = "const greeting = 'hello';\nconsole.log(greeting);\n";
        let min = minify_js(source).unwrap();
        assert!(min.len() <= source.len());
        assert_eq!(minify_js(source).unwrap(), min);
    }

    #[test]
    fn test_minify_rejects_broken_source() {
        assert!(minify_js("const = ;").is_err());
    }

    #[test]
    fn test_transpile_downlevels_newer_syntax() {
        // nullish coalescing (ES2020) must not survive the es2018 target
        let out = transpile_js("export const pick = (a, b) => a ?? b;").unwrap();
        assert!(!out.contains("??"));
        assert!(out.contains("pick"));
    }

    #[test]
    fn test_transpile_keeps_supported_syntax() {
        let out = transpile_js("const double = (n) => n * 2;\n").unwrap();
        assert!(out.contains("=>"));
    }
}
