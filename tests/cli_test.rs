use pipeline_lsp::Engine;
use pipeline_lsp::commands::check::run_check;
use pipeline_lsp::commands::outline::run_outline;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_check_reports_json() {
    let dir = TempDir::new().unwrap();
    let broken = write(&dir, "pipeline.yml", "jobs:\n- name: a\n  serial: yohoho\n  plan: []\n");
    let task = write(&dir, "tasks/unit.yml", "platform: linux\nrun:\n  path: make\n");

    let mut out = Vec::new();
    let has_errors = run_check(&Engine::default(), &[broken, task], false, true, &mut out).unwrap();
    assert!(has_errors);

    let reports: Value = serde_json::from_slice(&out).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["language"], "pipeline");
    assert_eq!(reports[0]["problems"][0]["code"], "invalid-value");
    assert_eq!(reports[0]["problems"][0]["line"], 3);
    assert_eq!(reports[0]["problems"][0]["column"], 11);
    assert_eq!(reports[1]["language"], "task");
    assert!(reports[1]["problems"].as_array().unwrap().is_empty());
}

#[test]
fn test_check_clean_file_has_no_errors() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "ci.yml", "jobs:\n- name: a\n  plan: []\n");
    colored::control::set_override(false);

    let mut out = Vec::new();
    let has_errors = run_check(&Engine::default(), &[path.clone()], false, false, &mut out).unwrap();
    assert!(!has_errors);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(&format!("✓ {}", path.display())), "{text}");
    assert!(text.contains("0 error(s), 0 warning(s)"), "{text}");
}

#[test]
fn test_check_forced_task_language() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "build.yml", "platform: linux\n");

    let mut out = Vec::new();
    let has_errors = run_check(&Engine::default(), &[path], true, true, &mut out).unwrap();
    assert!(has_errors);
    let reports: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(reports[0]["problems"][0]["message"], "'run' is required");
}

#[test]
fn test_check_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut out = Vec::new();
    let result = run_check(
        &Engine::default(),
        &[dir.path().join("absent.yml")],
        false,
        false,
        &mut out,
    );
    assert!(result.is_err());
}

#[test]
fn test_outline_lists_declarations() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "pipeline.yml",
        "resources:\n- name: repo\n  type: git\njobs:\n- name: build\n  plan:\n  - get: repo\n",
    );
    colored::control::set_override(false);

    let mut out = Vec::new();
    run_outline(&Engine::default(), &path, false, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text, "Resources (1)\n  repo git L2\nJobs (1)\n  build L5\n");
}
