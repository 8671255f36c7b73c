use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, CodeActionResponse, Range, TextEdit,
    WorkspaceEdit,
};

use crate::lsp::diagnostic::problem_to_diagnostic;
use crate::lsp::document::Document;
use crate::reconcile::Problem;

static TAB_STOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\d+:([^}]*)\}|\$\d+").expect("tab stop regex")
});

/// Drops `$1` and `${1:default}` markers, keeping defaults.
pub fn strip_tab_stops(snippet: &str) -> String {
    TAB_STOP
        .replace_all(snippet, |caps: &regex::Captures<'_>| {
            caps.get(1).map_or(String::new(), |m| m.as_str().to_string())
        })
        .into_owned()
}

fn overlaps(a: Range, b: Range) -> bool {
    a.start <= b.end && b.start <= a.end
}

/// Quick fixes of the published problems touching `range`, with edits
/// computed against the document's current text.
pub fn provide_code_actions(doc: &Document, problems: &[Problem], range: Range) -> Option<CodeActionResponse> {
    let mut actions = Vec::new();
    for problem in problems.iter().filter(|p| !p.fixes.is_empty()) {
        let diagnostic = problem_to_diagnostic(problem, &doc.lines);
        if !overlaps(diagnostic.range, range) {
            continue;
        }
        for fix in &problem.fixes {
            let edits: Vec<TextEdit> = fix
                .edits(&doc.content)
                .into_iter()
                .map(|edit| TextEdit {
                    range: doc.lines.range(edit.span),
                    new_text: if edit.snippet {
                        strip_tab_stops(&edit.new_text)
                    } else {
                        edit.new_text
                    },
                })
                .collect();
            if edits.is_empty() {
                continue;
            }
            actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                title: fix.label.clone(),
                kind: Some(CodeActionKind::QUICKFIX),
                diagnostics: Some(vec![diagnostic.clone()]),
                edit: Some(WorkspaceEdit {
                    changes: Some(HashMap::from([(doc.uri.clone(), edits)])),
                    ..Default::default()
                }),
                is_preferred: Some(problem.fixes.len() == 1),
                ..Default::default()
            }));
        }
    }
    tracing::debug!(uri = %doc.uri, count = actions.len(), "code actions");
    (!actions.is_empty()).then_some(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::languages::LanguageId;
    use crate::yaml::LineIndex;
    use tower_lsp::lsp_types::{Position, Url};

    #[test]
    fn test_strip_tab_stops() {
        assert_eq!(strip_tab_stops("name: $1\ntype: ${2:git}"), "name: \ntype: git");
    }

    #[test]
    fn test_missing_property_quick_fix() {
        let text = "resources:\n- name: repo\njobs: []\n";
        let doc = Document {
            uri: Url::parse("file:///ci/pipeline.yml").unwrap(),
            version: 1,
            language: LanguageId::Pipeline,
            content: text.to_string(),
            lines: LineIndex::new(text),
            generation: 1,
        };
        let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
        let range = Range::new(Position::new(0, 0), Position::new(3, 0));
        let actions = provide_code_actions(&doc, &problems, range).unwrap();
        let titles: Vec<String> = actions
            .iter()
            .filter_map(|a| match a {
                CodeActionOrCommand::CodeAction(action) => Some(action.title.clone()),
                CodeActionOrCommand::Command(_) => None,
            })
            .collect();
        assert!(titles.contains(&"Add property 'type'".to_string()));
    }
}
