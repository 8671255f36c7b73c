use colored::*;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::assist::Symbol;
use crate::commands::check::language_for;
use crate::engine::Engine;
use crate::yaml::LineIndex;
use crate::{PipelineError, Result};

pub fn run_outline(engine: &Engine, path: &Path, task: bool, out: &mut impl Write) -> Result<()> {
    let text = fs::read_to_string(path)
        .map_err(|e| PipelineError::DocumentLoadError(format!("{}: {}", path.display(), e)))?;
    let language = language_for(path, task);
    let lines = LineIndex::new(&text);
    let outline = engine.symbols(language, &text);

    if outline.is_empty() {
        writeln!(out, "{}", "No declarations found".yellow())?;
        return Ok(());
    }
    for section in &outline {
        writeln!(out, "{} ({})", section.name.bold(), section.children.len())?;
        for symbol in &section.children {
            write_symbol(out, symbol, &lines)?;
        }
    }
    Ok(())
}

fn write_symbol(out: &mut impl Write, symbol: &Symbol, lines: &LineIndex) -> Result<()> {
    let line = lines.position(symbol.selection.start).line + 1;
    match &symbol.detail {
        Some(detail) => writeln!(out, "  {} {} {}", symbol.name, detail.cyan(), format!("L{line}").dimmed())?,
        None => writeln!(out, "  {} {}", symbol.name, format!("L{line}").dimmed())?,
    }
    Ok(())
}

pub fn execute_outline(engine: &Engine, path: &Path, task: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_outline(engine, path, task, &mut out)
}
