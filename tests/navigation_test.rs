use pipeline_lsp::{Engine, LanguageId};
use std::fs;

fn pipeline() -> String {
    fs::read_to_string("tests/fixtures/pipeline.yml").unwrap()
}

#[test]
fn test_definition_of_job_in_passed() {
    let text = pipeline();
    let offset = text.find("passed: [unit]").unwrap() + "passed: [".len() + 1;
    let span = Engine::default()
        .definition(LanguageId::Pipeline, &text, offset)
        .unwrap();
    assert_eq!(&text[span.start..span.end], "unit");
    assert_eq!(span.start, text.find("name: unit").unwrap() + "name: ".len());
}

#[test]
fn test_definition_of_custom_resource_type() {
    let text = pipeline();
    let offset = text.find("type: slack").unwrap() + "type: ".len() + 1;
    let span = Engine::default()
        .definition(LanguageId::Pipeline, &text, offset)
        .unwrap();
    assert_eq!(span.start, text.find("name: slack").unwrap() + "name: ".len());
}

#[test]
fn test_hover_on_resource_reference() {
    let text = pipeline();
    let offset = text.find("- get: repo").unwrap() + "- get: ".len() + 1;
    let hover = Engine::default()
        .hover(LanguageId::Pipeline, &text, offset)
        .unwrap();
    assert!(hover.contents.starts_with("**Resource** `repo`"), "{}", hover.contents);
    assert!(hover.contents.contains("type: `git`"), "{}", hover.contents);
}

#[test]
fn test_hover_on_deprecated_key() {
    let text = "jobs:\n- name: a\n  build_logs_to_retain: 3\n  plan: []\n";
    let offset = text.find("build_logs").unwrap() + 2;
    let hover = Engine::default()
        .hover(LanguageId::Pipeline, text, offset)
        .unwrap();
    assert!(hover.contents.contains("*Deprecated*: use `build_log_retention` instead."));
}

#[test]
fn test_outline_of_pipeline() {
    let text = pipeline();
    let outline = Engine::default().symbols(LanguageId::Pipeline, &text);
    let sections: Vec<&str> = outline.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(sections, vec!["Resources", "Resource Types", "Jobs", "Groups"]);

    let jobs: Vec<&str> = outline[2].children.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(jobs, vec!["unit", "ship"]);
    let types: Vec<Option<&str>> = outline[0]
        .children
        .iter()
        .map(|s| s.detail.as_deref())
        .collect();
    assert_eq!(types, vec![Some("git"), Some("time"), Some("slack")]);
}

#[test]
fn test_task_files_have_no_outline() {
    let text = fs::read_to_string("tests/fixtures/tasks/unit.yml").unwrap();
    assert!(Engine::default().symbols(LanguageId::Task, &text).is_empty());
}
