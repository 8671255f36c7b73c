use pipeline_lsp::reconcile::{ProblemCode, Severity, apply_edits};
use pipeline_lsp::{Engine, LanguageId};
use std::fs;
use std::path::Path;

fn fixture(name: &str) -> String {
    fs::read_to_string(Path::new("tests/fixtures").join(name)).unwrap()
}

#[test]
fn test_realistic_pipeline_is_clean() {
    let text = fixture("pipeline.yml");
    let problems = Engine::default().reconcile(LanguageId::Pipeline, &text);
    assert!(problems.is_empty(), "unexpected problems: {problems:#?}");
}

#[test]
fn test_task_file_is_clean() {
    let text = fixture("tasks/unit.yml");
    let problems = Engine::default().reconcile(LanguageId::Task, &text);
    assert!(problems.is_empty(), "unexpected problems: {problems:#?}");
}

#[test]
fn test_missing_type_and_unused_resource() {
    let text = "resources:\n- name: foo\n  source:\n    username: someone";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert_eq!(problems.len(), 2, "{problems:#?}");

    let missing = problems
        .iter()
        .find(|p| p.code == ProblemCode::MissingProperty)
        .unwrap();
    assert_eq!(missing.message, "'type' is required");
    assert_eq!(missing.severity, Severity::Error);
    assert_eq!(&text[missing.span.start..missing.span.end], "-");

    let unused = problems
        .iter()
        .find(|p| p.code == ProblemCode::UnusedEntity)
        .unwrap();
    assert_eq!(unused.message, "Unused 'Resource'");
    assert_eq!(unused.severity, Severity::Warning);
    assert_eq!(&text[unused.span.start..unused.span.end], "foo");
}

#[test]
fn test_missing_property_fix_inserts_at_item_indent() {
    let text = fixture("missing_type.yml");
    let engine = Engine::default();
    let problems = engine.reconcile(LanguageId::Pipeline, &text);
    let missing = problems
        .iter()
        .find(|p| p.code == ProblemCode::MissingProperty)
        .unwrap();
    assert_eq!(missing.fixes.len(), 1);
    assert_eq!(missing.fixes[0].label, "Add property 'type'");

    let fixed = apply_edits(&text, &missing.fixes[0].edits(&text));
    assert!(fixed.ends_with("    username: someone\n  type: \n"), "{fixed:?}");

    let again = engine.reconcile(LanguageId::Pipeline, &fixed);
    assert!(
        !again.iter().any(|p| p.message == "'type' is required"),
        "{again:#?}"
    );
}

#[test]
fn test_several_missing_properties_are_listed_together() {
    let text = "platform: linux\n";
    let problems = Engine::default().reconcile(LanguageId::Task, text);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert_eq!(problems[0].message, "'run' is required");

    let problems = Engine::default().reconcile(LanguageId::Task, "inputs: []\n");
    let missing = problems
        .iter()
        .find(|p| p.code == ProblemCode::MissingProperty)
        .unwrap();
    assert_eq!(missing.message, "[platform, run] are required");
    assert_eq!(missing.fixes[0].label, "Add properties: [platform, run]");
}

#[test]
fn test_duplicate_top_level_keys() {
    let text = "resources: []\njobs: []\nresources: []\n";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    let duplicates: Vec<_> = problems
        .iter()
        .filter(|p| p.code == ProblemCode::DuplicateKey)
        .collect();
    assert_eq!(duplicates.len(), 2);
    assert!(duplicates.iter().all(|p| p.message == "Duplicate key 'resources'"));
    assert_ne!(duplicates[0].span, duplicates[1].span);
}

#[test]
fn test_boolean_with_unknown_value() {
    let text = "jobs:\n- name: a\n  serial: yohoho\n  plan: []\n";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert_eq!(problems[0].code, ProblemCode::InvalidValue);
    assert_eq!(
        problems[0].message,
        "'yohoho' is an unknown 'boolean'. Valid values are: [false, true]"
    );
    assert_eq!(&text[problems[0].span.start..problems[0].span.end], "yohoho");
}

#[test]
fn test_jobs_outside_groups() {
    let text = fixture("groups.yml");
    let engine = Engine::default();
    let problems = engine.reconcile(LanguageId::Pipeline, &text);
    let mut flagged: Vec<&str> = problems
        .iter()
        .filter(|p| p.code == ProblemCode::NoGroup)
        .map(|p| p.message.as_str())
        .collect();
    flagged.sort();
    assert_eq!(flagged, vec!["'e' belongs to no group", "'f' belongs to no group"]);
    assert!(
        problems
            .iter()
            .filter(|p| p.code == ProblemCode::NoGroup)
            .all(|p| p.severity == Severity::Warning)
    );

    let without_groups = &text[..text.find("groups:").unwrap()];
    let problems = engine.reconcile(LanguageId::Pipeline, without_groups);
    assert!(!problems.iter().any(|p| p.code == ProblemCode::NoGroup));
}

#[test]
fn test_group_wildcards() {
    let text = "\
jobs:
- name: build-linux
  plan: []
- name: build-windows
  plan: []
- name: publish
  plan: []
groups:
- name: builds
  jobs: [build-*]
- name: typo
  jobs: [deploy-*]
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    let messages: Vec<&str> = problems.iter().map(|p| p.message.as_str()).collect();
    assert!(messages.contains(&"'publish' belongs to no group"), "{messages:?}");
    assert!(messages.contains(&"'deploy-*' does not match any existing job"), "{messages:?}");
    assert!(!messages.iter().any(|m| m.contains("build-linux")));
}

#[test]
fn test_uninterpretable_group_pattern_disables_check() {
    let text = "\
jobs:
- name: a
  plan: []
- name: b
  plan: []
groups:
- name: some
  jobs: [\"{a,c}\"]
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert!(problems.is_empty(), "{problems:#?}");
}

#[test]
fn test_unresolved_resource_lists_existing_names() {
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
  - get: rpeo
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert_eq!(problems[0].code, ProblemCode::UnresolvedReference);
    assert_eq!(
        problems[0].message,
        "Resource 'rpeo' does not exist. Existing resources: [repo]"
    );
}

#[test]
fn test_get_with_resource_names_a_local_alias() {
    let text = "\
resources:
- name: repo
  type: git
  source:
    uri: https://example.com/repo.git
jobs:
- name: build
  plan:
  - get: source-code
    resource: repo
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert!(problems.is_empty(), "{problems:#?}");
}

#[test]
fn test_passed_job_must_use_resource() {
    let text = "\
resources:
- name: repo
  type: git
  source:
    uri: https://example.com/repo.git
- name: other
  type: git
  source:
    uri: https://example.com/other.git
jobs:
- name: unit
  plan:
  - get: other
- name: ship
  plan:
  - get: repo
    passed: [unit]
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert_eq!(problems[0].code, ProblemCode::NoInteraction);
    assert_eq!(problems[0].message, "Job 'unit' does not interact with resource 'repo'");
}

#[test]
fn test_deprecated_step_and_constraints() {
    let text = "\
jobs:
- name: a
  build_logs_to_retain: 10
  plan:
  - aggregate: []
  - task: unit
    config:
      platform: linux
      run: {path: make}
    file: ci/unit.yml
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    let messages: Vec<&str> = problems.iter().map(|p| p.message.as_str()).collect();
    assert!(
        messages.contains(&"Deprecated: 'build_logs_to_retain' is replaced by 'build_log_retention'"),
        "{messages:?}"
    );
    assert!(
        messages.contains(&"Deprecated: 'aggregate' is replaced by 'in_parallel'"),
        "{messages:?}"
    );
    let exclusive = problems
        .iter()
        .filter(|p| {
            p.code == ProblemCode::ConstraintViolation
                && p.message == "Only one of [config, file] should be defined"
        })
        .count();
    assert_eq!(exclusive, 2, "{problems:#?}");
}

#[test]
fn test_placeholders_are_not_validated() {
    let text = "\
jobs:
- name: a
  serial: ((serial))
  max_in_flight: ((limit))
  build_logs_to_retain: \"{{retain}}\"
  plan: []
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert!(
        !problems.iter().any(|p| p.code == ProblemCode::InvalidValue),
        "{problems:#?}"
    );
}

#[test]
fn test_malformed_document_still_reports_later_problems() {
    let text = "\
jobs:
- name: a
  plan: [
- name: b
  serial: maybe
  plan: []
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    assert!(problems.iter().any(|p| p.code == ProblemCode::SyntaxError), "{problems:#?}");
    assert!(
        problems
            .iter()
            .any(|p| p.code == ProblemCode::InvalidValue && p.message.starts_with("'maybe'")),
        "{problems:#?}"
    );
}

#[test]
fn test_task_image_is_renamed_to_rootfs_uri() {
    let text = "platform: linux\nimage: /some/rootfs\nrun: {path: make}\n";
    let problems = Engine::default().reconcile(LanguageId::Task, text);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert_eq!(problems[0].code, ProblemCode::DeprecatedProperty);
    assert_eq!(problems[0].severity, Severity::Warning);
    assert_eq!(
        problems[0].message,
        "Deprecated: 'image' is replaced by 'rootfs_uri'"
    );
    assert_eq!(&text[problems[0].span.start..problems[0].span.end], "image");
    assert_eq!(problems[0].fixes[0].label, "Replace with 'rootfs_uri'");
}

#[test]
fn test_task_file_needs_no_image() {
    let text = "platform: linux\nrun: {path: make}\n";
    let problems = Engine::default().reconcile(LanguageId::Task, text);
    assert!(problems.is_empty(), "{problems:#?}");
}

#[test]
fn test_task_image_sources_are_exclusive() {
    let text = "\
platform: linux
image_resource:
  type: registry-image
  source: {repository: ruby}
rootfs_uri: some-image
run: {path: make}
";
    let problems = Engine::default().reconcile(LanguageId::Task, text);
    let flagged: Vec<&str> = problems
        .iter()
        .filter(|p| p.message == "Only one of [image_resource, rootfs_uri, image] should be defined")
        .map(|p| &text[p.span.start..p.span.end])
        .collect();
    assert_eq!(flagged, vec!["image_resource", "rootfs_uri"], "{problems:#?}");
}

#[test]
fn test_embedded_config_needs_an_image() {
    let text = "\
jobs:
- name: myjob
  plan:
  - task: foo
    config:
      inputs:
      - name: foo
";
    let problems = Engine::default().reconcile(LanguageId::Pipeline, text);
    let image = problems
        .iter()
        .find(|p| p.message == "One of [image_resource, rootfs_uri, image] is required")
        .unwrap();
    assert_eq!(image.severity, Severity::Warning);
    assert!(image.fixes.is_empty());

    let missing = problems
        .iter()
        .find(|p| p.message == "[platform, run] are required")
        .unwrap();
    assert_eq!(missing.fixes.len(), 1);
    assert_eq!(missing.fixes[0].label, "Add properties: [platform, run]");
}
