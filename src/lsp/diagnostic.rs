use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};

use crate::reconcile::{Problem, Severity};
use crate::yaml::LineIndex;

pub const SOURCE: &str = "pipeline-lsp";

pub fn severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
    }
}

/// Convert a Problem to an LSP Diagnostic
pub fn problem_to_diagnostic(problem: &Problem, lines: &LineIndex) -> Diagnostic {
    Diagnostic {
        range: lines.range(problem.span),
        severity: Some(severity(problem.severity)),
        code: Some(NumberOrString::String(problem.code.as_str().to_string())),
        source: Some(SOURCE.to_string()),
        message: problem.message.clone(),
        ..Default::default()
    }
}
