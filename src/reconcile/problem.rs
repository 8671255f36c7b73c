use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::yaml::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Broad classes of problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProblemCategory {
    Syntax,
    SchemaViolation,
    TypeError,
    ReferenceError,
    Internal,
}

/// Stable problem codes. Editors receive [`ProblemCode::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProblemCode {
    SyntaxError,
    UndefinedAlias,
    MalformedMerge,
    MissingProperty,
    UnknownProperty,
    DuplicateKey,
    DeprecatedProperty,
    ConstraintViolation,
    WrongShape,
    InvalidValue,
    DuplicateName,
    UnresolvedReference,
    UnusedEntity,
    UnmatchedPattern,
    NoGroup,
    NoInteraction,
    UnknownRepository,
    InternalError,
}

impl ProblemCode {
    pub fn category(self) -> ProblemCategory {
        use ProblemCode::*;
        match self {
            SyntaxError | MalformedMerge => ProblemCategory::Syntax,
            MissingProperty | UnknownProperty | DuplicateKey | DeprecatedProperty
            | ConstraintViolation | WrongShape | NoGroup => ProblemCategory::SchemaViolation,
            InvalidValue => ProblemCategory::TypeError,
            UndefinedAlias | DuplicateName | UnresolvedReference | UnusedEntity
            | UnmatchedPattern | NoInteraction | UnknownRepository => {
                ProblemCategory::ReferenceError
            }
            InternalError => ProblemCategory::Internal,
        }
    }

    pub fn as_str(self) -> &'static str {
        use ProblemCode::*;
        match self {
            SyntaxError => "yaml-syntax",
            UndefinedAlias => "undefined-alias",
            MalformedMerge => "malformed-merge",
            MissingProperty => "missing-property",
            UnknownProperty => "unknown-property",
            DuplicateKey => "duplicate-key",
            DeprecatedProperty => "deprecated-property",
            ConstraintViolation => "property-constraint",
            WrongShape => "wrong-shape",
            InvalidValue => "invalid-value",
            DuplicateName => "duplicate-name",
            UnresolvedReference => "unresolved-reference",
            UnusedEntity => "unused-entity",
            UnmatchedPattern => "unmatched-pattern",
            NoGroup => "no-group",
            NoInteraction => "no-interaction",
            UnknownRepository => "unknown-repository",
            InternalError => "internal-error",
        }
    }
}

/// Replacement of a span of the document. `snippet` marks text carrying
/// `$1`-style tab stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub span: Span,
    pub new_text: String,
    pub snippet: bool,
}

impl TextEdit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            span: Span::empty(at),
            new_text: text.into(),
            snippet: false,
        }
    }

    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Self {
            span,
            new_text: text.into(),
            snippet: false,
        }
    }

    pub fn as_snippet(mut self) -> Self {
        self.snippet = true;
        self
    }
}

type EditFn = dyn Fn(&str) -> Vec<TextEdit> + Send + Sync;

/// A labelled edit computed against the document text at apply time.
#[derive(Clone)]
pub struct QuickFix {
    pub label: String,
    edit: Arc<EditFn>,
}

impl QuickFix {
    pub fn new(
        label: impl Into<String>,
        edit: impl Fn(&str) -> Vec<TextEdit> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            edit: Arc::new(edit),
        }
    }

    pub fn edits(&self, text: &str) -> Vec<TextEdit> {
        (self.edit)(text)
    }
}

impl fmt::Debug for QuickFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickFix")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    pub code: ProblemCode,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    #[serde(skip)]
    pub fixes: Vec<QuickFix>,
}

impl Problem {
    pub fn new(code: ProblemCode, severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            span,
            fixes: Vec::new(),
        }
    }

    pub fn error(code: ProblemCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, Severity::Error, message, span)
    }

    pub fn warning(code: ProblemCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, Severity::Warning, message, span)
    }

    pub fn with_fix(mut self, fix: QuickFix) -> Self {
        self.fixes.push(fix);
        self
    }

    pub fn category(&self) -> ProblemCategory {
        self.code.category()
    }
}

/// Applies non-overlapping edits to `text`.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    let mut result = text.to_string();
    for edit in sorted {
        let start = edit.span.start.min(result.len());
        let end = edit.span.end.min(result.len());
        result.replace_range(start..end, &edit.new_text);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_edits_from_the_back() {
        let text = "a: 1\nb: 2\n";
        let edits = vec![
            TextEdit::insert(0, "x: 0\n"),
            TextEdit::replace(Span::new(8, 9), "3"),
        ];
        assert_eq!(apply_edits(text, &edits), "x: 0\na: 1\nb: 3\n");
    }

    #[test]
    fn test_codes_map_to_categories() {
        assert_eq!(
            ProblemCode::MissingProperty.category(),
            ProblemCategory::SchemaViolation
        );
        assert_eq!(ProblemCode::InvalidValue.category(), ProblemCategory::TypeError);
        assert_eq!(
            ProblemCode::UnresolvedReference.category(),
            ProblemCategory::ReferenceError
        );
    }
}
