//! Turning a document into a list of problems.
//!
//! Reconciliation runs in phases: parsing, the schema walk, duplicate keys,
//! entity checks and the language's own rules. Each phase is isolated so a
//! fault in one still leaves the others' problems in place.
pub mod glob;
pub mod problem;
pub mod semantic;
pub mod structural;

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio_util::sync::CancellationToken;

pub use problem::{
    Problem, ProblemCategory, ProblemCode, QuickFix, Severity, TextEdit, apply_edits,
};

use crate::index::EntityIndex;
use crate::languages::Language;
use crate::providers::Providers;
use crate::schema::matcher::WalkOptions;
use crate::schema::{TypedTree, walk};
use crate::yaml::{Ast, Span};
use semantic::RuleContext;

/// Everything known about one version of a document.
pub struct Analysis {
    pub ast: Ast,
    pub tree: TypedTree,
    pub index: EntityIndex,
}

impl Analysis {
    pub fn new(language: &Language, text: &str, providers: &Providers, check_values: bool) -> Self {
        let ast = Ast::parse(text);
        let shadowed = language.shadowed(&ast);
        let options = WalkOptions {
            providers,
            check_values,
            shadowed: &shadowed,
        };
        let tree = walk(&ast, &language.schema, &options);
        let index = EntityIndex::build(&tree);
        Self { ast, tree, index }
    }
}

fn guarded<T>(phase: &str, problems: &mut Vec<Problem>, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown fault".to_string());
            tracing::error!(phase, detail = %detail, "reconcile phase failed");
            problems.push(Problem::error(
                ProblemCode::InternalError,
                format!("Internal error while checking the document ({phase}): {detail}"),
                Span::empty(0),
            ));
            None
        }
    }
}

pub fn reconcile(language: &Language, text: &str, providers: &Providers) -> Vec<Problem> {
    reconcile_cancellable(language, text, providers, &CancellationToken::new()).unwrap_or_default()
}

/// Returns `None` when `cancel` fires before the pass completes.
pub fn reconcile_cancellable(
    language: &Language,
    text: &str,
    providers: &Providers,
    cancel: &CancellationToken,
) -> Option<Vec<Problem>> {
    let mut problems = Vec::new();
    let schema = &language.schema;

    let ast = guarded("parse", &mut problems, || Ast::parse(text))?;
    problems.extend(structural::syntax_problems(&ast));
    if cancel.is_cancelled() {
        return None;
    }

    let shadowed = language.shadowed(&ast);
    let options = WalkOptions {
        providers,
        check_values: true,
        shadowed: &shadowed,
    };
    let tree = guarded("schema", &mut problems, || walk(&ast, schema, &options)).unwrap_or_default();
    if let Some(found) = guarded("structure", &mut problems, || {
        let mut found = structural::violation_problems(&ast, schema, &tree);
        found.extend(structural::duplicate_keys(&ast));
        found
    }) {
        problems.extend(found);
    }
    if cancel.is_cancelled() {
        return None;
    }

    let index = EntityIndex::build(&tree);
    let ctx = RuleContext {
        ast: &ast,
        schema,
        tree: &tree,
        index: &index,
    };
    if let Some(found) = guarded("entities", &mut problems, || semantic::check_entities(&ctx)) {
        problems.extend(found);
    }
    for rule in &language.rules {
        if cancel.is_cancelled() {
            return None;
        }
        let mut found = Vec::new();
        if guarded(rule.name(), &mut problems, || rule.check(&ctx, &mut found)).is_some() {
            problems.extend(found);
        }
    }

    Some(finish(problems))
}

/// Orders problems by position and drops repeats of the same message on
/// the same range.
fn finish(mut problems: Vec<Problem>) -> Vec<Problem> {
    problems.sort_by(|a, b| {
        (a.span.start, a.span.end)
            .cmp(&(b.span.start, b.span.end))
            .then_with(|| a.message.cmp(&b.message))
    });
    let mut seen = HashSet::new();
    problems.retain(|p| seen.insert((p.span, p.message.clone())));
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::{LanguageId, language};

    fn problems(text: &str) -> Vec<Problem> {
        reconcile(language(LanguageId::Pipeline), text, &Providers::none())
    }

    #[test]
    fn test_clean_pipeline_has_no_problems() {
        let text = "\
resources:
- name: repo
  type: git
  source:
    uri: https://example.com/repo.git
jobs:
- name: build
  plan:
  - get: repo
";
        let found = problems(text);
        assert!(found.is_empty(), "{found:?}");
    }

    #[test]
    fn test_syntax_errors_are_merged() {
        let found = problems("jobs:\n- name: a\n  plan: *nowhere\n");
        assert!(found.iter().any(|p| p.code == ProblemCode::UndefinedAlias));
    }

    #[test]
    fn test_cancelled_pass_returns_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = reconcile_cancellable(
            language(LanguageId::Pipeline),
            "jobs: []\n",
            &Providers::none(),
            &cancel,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_problems_are_sorted_and_unique() {
        let found = problems("resources: []\nresources: []\n");
        assert_eq!(found.len(), 2);
        assert!(found[0].span.start < found[1].span.start);
    }
}
