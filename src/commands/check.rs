use colored::*;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::engine::Engine;
use crate::languages::LanguageId;
use crate::reconcile::{Problem, Severity};
use crate::yaml::LineIndex;
use crate::{PipelineError, Result};

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    pub language: LanguageId,
    pub problems: Vec<ReportedProblem>,
}

#[derive(Debug, Serialize)]
pub struct ReportedProblem {
    /// 1-based
    pub line: u32,
    /// 1-based, UTF-16 units
    pub column: u32,
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

impl FileReport {
    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(|p| p.severity == Severity::Error)
    }
}

/// Picks the language for `path`; `task` forces task files.
pub fn language_for(path: &Path, task: bool) -> LanguageId {
    if task {
        LanguageId::Task
    } else {
        LanguageId::from_path(path)
    }
}

pub fn check_file(engine: &Engine, path: &Path, task: bool) -> Result<FileReport> {
    let text = fs::read_to_string(path)
        .map_err(|e| PipelineError::DocumentLoadError(format!("{}: {}", path.display(), e)))?;
    let language = language_for(path, task);
    let lines = LineIndex::new(&text);
    let problems = engine
        .reconcile(language, &text)
        .iter()
        .map(|problem| report(problem, &lines))
        .collect();
    tracing::debug!(file = %path.display(), %language, "checked");
    Ok(FileReport {
        file: path.display().to_string(),
        language,
        problems,
    })
}

fn report(problem: &Problem, lines: &LineIndex) -> ReportedProblem {
    let position = lines.position(problem.span.start);
    ReportedProblem {
        line: position.line + 1,
        column: position.character + 1,
        severity: problem.severity,
        code: problem.code.as_str(),
        message: problem.message.clone(),
    }
}

/// Checks every file and writes the problems to `out`. Returns true when
/// any file has an error.
pub fn run_check(
    engine: &Engine,
    files: &[PathBuf],
    task: bool,
    json: bool,
    out: &mut impl Write,
) -> Result<bool> {
    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        reports.push(check_file(engine, file, task)?);
    }
    let has_errors = reports.iter().any(FileReport::has_errors);

    if json {
        serde_json::to_writer_pretty(&mut *out, &reports)?;
        writeln!(out)?;
        return Ok(has_errors);
    }

    let mut errors = 0;
    let mut warnings = 0;
    for report in &reports {
        if report.problems.is_empty() {
            writeln!(out, "{} {}", "✓".green(), report.file)?;
            continue;
        }
        for problem in &report.problems {
            let label = match problem.severity {
                Severity::Error => {
                    errors += 1;
                    "error".red().bold()
                }
                Severity::Warning => {
                    warnings += 1;
                    "warning".yellow().bold()
                }
                Severity::Info => "info".blue().bold(),
            };
            writeln!(
                out,
                "{}:{}:{}: {}[{}]: {}",
                report.file.bold(),
                problem.line,
                problem.column,
                label,
                problem.code,
                problem.message
            )?;
        }
    }

    writeln!(out)?;
    let summary = format!("{} error(s), {} warning(s)", errors, warnings);
    if has_errors {
        writeln!(out, "{} {}", "✗".red().bold(), summary.red().bold())?;
    } else {
        writeln!(out, "{} {}", "✓".green().bold(), summary.green())?;
    }
    Ok(has_errors)
}

pub fn execute_check(engine: &Engine, files: &[PathBuf], task: bool, json: bool) -> Result<bool> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_check(engine, files, task, json, &mut out)
}
