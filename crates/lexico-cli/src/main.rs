//! Lexico command-line compiler.
//!
//! `lexico <program.json>` compiles one program and writes `<program>.wasm`,
//! the runtime support library and the discovered host libraries into the
//! current directory.

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use lexico_compiler::ModuleCompiler;
use lexico_library::DiscoveryConfig;
use lexico_types::{CompileErrors, SourceFile};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lexico")]
#[command(author, version, about = "Lexico Compiler", long_about = None)]
struct Cli {
    /// Program to compile
    file: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    build(cli.file)
}

fn build(file: PathBuf) -> Result<()> {
    let text = fs::read_to_string(&file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let output_name = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .with_context(|| format!("No file name in {}", file.display()))?;

    let config = DiscoveryConfig::for_installation();
    tracing::debug!(runtime = %config.runtime.display(), "discovering libraries");
    let mut compiler = ModuleCompiler::new(&config).with_context(|| {
        format!(
            "Failed to load libraries (runtime: {})",
            config.runtime.display()
        )
    })?;

    let out_dir = env::current_dir().context("Failed to resolve the current directory")?;
    let source = SourceFile::new(file.display().to_string(), text);
    let errors = compiler.build(&source, &output_name, &out_dir)?;

    if errors.has_errors() {
        eprint!("{}", render_diagnostics(&errors));
        bail!("Compilation failed with {} error(s)", errors.total_errors);
    }
    println!("{}", out_dir.join(format!("{output_name}.wasm")).display());
    Ok(())
}

fn render_diagnostics(errors: &CompileErrors) -> String {
    let mut out = String::new();
    for err in &errors.errors {
        out.push_str(&format!("{err}\n"));
        if !err.source_line.is_empty() {
            out.push_str(&format!("    {}\n", err.source_line.trim_end()));
        }
        if let Some(suggestion) = &err.suggestion {
            out.push_str(&format!("    help: {suggestion}\n"));
        }
    }
    let hidden = errors.total_errors.saturating_sub(errors.errors.len());
    if hidden > 0 {
        out.push_str(&format!("... and {hidden} more error(s)\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use lexico_types::{CompileError, ErrorCode, Span};

    use super::*;

    #[test]
    fn diagnostics_show_line_and_help() {
        let mut errors = CompileErrors::empty();
        errors.push_error(
            CompileError::new(
                "prog.json",
                ErrorCode::UNDECLARED_VARIABLE,
                "Variable 'y' is not declared",
                Span::point(2, 3),
                "  { \"variable\": \"y\" }",
            )
            .with_suggestion("add 'y' to the variable list"),
        );
        let rendered = render_diagnostics(&errors);
        assert_eq!(
            rendered,
            "prog.json:2:3: E300 [scope] Variable 'y' is not declared\n\
             \x20     { \"variable\": \"y\" }\n\
             \x20   help: add 'y' to the variable list\n"
        );
    }

    #[test]
    fn hidden_errors_are_counted() {
        let mut errors = CompileErrors::empty();
        for _ in 0..lexico_types::MAX_ERRORS + 2 {
            errors.push_error(CompileError::new(
                "p.json",
                ErrorCode::UNDEFINED_LABEL,
                "Label 'x' is not defined in this routine",
                Span::default(),
                "",
            ));
        }
        assert!(render_diagnostics(&errors).ends_with("... and 2 more error(s)\n"));
    }
}
