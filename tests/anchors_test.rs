use pipeline_lsp::reconcile::ProblemCode;
use pipeline_lsp::{Engine, LanguageId};
use std::fs;

#[test]
fn test_merged_item_inherits_anchor_properties() {
    let text = fs::read_to_string("tests/fixtures/anchors.yml").unwrap();
    let problems = Engine::default().reconcile(LanguageId::Pipeline, &text);
    assert!(problems.is_empty(), "{problems:#?}");
}

#[test]
fn test_problems_inside_anchor_are_reported_once() {
    let text = "\
resources:
- &base
  name: repo
  type: git
  check_every: sometimes
  source:
    uri: https://example.com/repo.git
- <<: *base
  name: mirror
jobs:
- name: build
  plan:
  - get: repo
  - get: mirror
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    let invalid: Vec<_> = problems
        .iter()
        .filter(|p| p.code == ProblemCode::InvalidValue)
        .collect();
    assert_eq!(invalid.len(), 1, "{problems:#?}");
    assert_eq!(
        &text[invalid[0].span.start..invalid[0].span.end],
        "sometimes"
    );
}

#[test]
fn test_undefined_alias_does_not_stop_checking() {
    let text = "\
jobs:
- name: a
  plan: *steps
- name: b
  serial: nope
  plan: []
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert!(problems.iter().any(|p| p.code == ProblemCode::UndefinedAlias));
    assert!(problems.iter().any(|p| p.code == ProblemCode::InvalidValue));
}

#[test]
fn test_merge_of_scalar_is_malformed() {
    let text = "\
limits: &limits 5
jobs:
- <<: *limits
  name: a
  plan: []
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert!(
        problems.iter().any(|p| p.code == ProblemCode::MalformedMerge),
        "{problems:#?}"
    );
}

#[test]
fn test_alias_definition_points_at_anchor() {
    let text = fs::read_to_string("tests/fixtures/anchors.yml").unwrap();
    let offset = text.find("*base").unwrap() + 2;
    let span = Engine::default()
        .definition(LanguageId::Pipeline, &text, offset)
        .unwrap();
    assert_eq!(span.start, text.find("&base").unwrap());
}
