use async_trait::async_trait;
use pipeline_lsp::assist::{Proposal, ProposalKind, Tier};
use pipeline_lsp::providers::{ProviderError, Providers, RepoInfoProvider};
use pipeline_lsp::{Engine, LanguageId};
use std::sync::Arc;

fn complete(language: LanguageId, text: &str) -> Vec<Proposal> {
    Engine::default().complete(language, text, text.len())
}

fn labels(proposals: &[Proposal]) -> Vec<&str> {
    proposals.iter().map(|p| p.label.as_str()).collect()
}

#[test]
fn test_required_property_brings_missing_siblings() {
    let proposals = complete(LanguageId::Task, "pla");
    let platform = proposals.iter().find(|p| p.label == "platform").unwrap();
    assert_eq!(platform.kind, ProposalKind::Property);
    assert!(platform.snippet);
    assert_eq!(platform.text, "platform: $1\nrun:\n  path: $2");
}

#[test]
fn test_present_siblings_are_not_inserted_again() {
    let proposals = complete(LanguageId::Task, "run:\n  path: make\npla");
    let platform = proposals.iter().find(|p| p.label == "platform").unwrap();
    assert_eq!(platform.text, "platform: $1");
    assert!(!labels(&proposals).contains(&"run"));
}

#[test]
fn test_enum_values() {
    let proposals = complete(LanguageId::Task, "platform: l");
    assert_eq!(labels(&proposals), vec!["linux"]);
    assert_eq!(proposals[0].kind, ProposalKind::Value);
}

#[test]
fn test_resource_names_for_get() {
    let text = "\
resources:
- name: repo
  type: git
- name: nightly
  type: time
jobs:
- name: build
  plan:
  - get: ";
    let proposals = complete(LanguageId::Pipeline, text);
    assert_eq!(labels(&proposals), vec!["nightly", "repo"]);
    assert!(proposals.iter().all(|p| p.kind == ProposalKind::Reference));
}

#[test]
fn test_passed_excludes_enclosing_job() {
    let text = "\
jobs:
- name: unit
  plan: []
- name: ship
  plan:
  - get: repo
    passed:
    - ";
    let proposals = complete(LanguageId::Pipeline, text);
    let names = labels(&proposals);
    assert!(names.contains(&"unit"), "{names:?}");
    assert!(!names.contains(&"ship"), "{names:?}");
}

#[test]
fn test_dedented_alternatives_sort_after_exact() {
    let text = "\
jobs:
- name: a
  plan:
  - get: repo
    tri";
    let proposals = complete(LanguageId::Pipeline, text);
    let names = labels(&proposals);
    let trigger = names.iter().position(|l| *l == "trigger").unwrap();
    let dedented = names.iter().position(|l| *l == "← interruptible").unwrap();
    assert!(trigger < dedented, "{names:?}");

    let interruptible = &proposals[dedented];
    assert_eq!(interruptible.tier, Tier::Dedented);
    assert!(interruptible.text.starts_with("  interruptible: "));
    assert_eq!(interruptible.span.start, text.rfind('\n').unwrap() + 1);
}

#[test]
fn test_entity_snippet_after_sequence() {
    let text = "resources:\n- name: repo\n  type: git\n";
    let proposals = complete(LanguageId::Pipeline, text);
    let snippet = proposals
        .iter()
        .find(|p| p.label == "- Resource Snippet")
        .unwrap();
    assert_eq!(snippet.kind, ProposalKind::Snippet);
    assert_eq!(snippet.text, "- name: $1\n  type: $2");
}

#[test]
fn test_deprecated_properties_sort_last() {
    let text = "jobs:\n- name: a\n  plan: []\n  b";
    let proposals = complete(LanguageId::Pipeline, text);
    let names = labels(&proposals);
    let retention = names.iter().position(|l| *l == "build_log_retention").unwrap();
    let deprecated = names.iter().position(|l| *l == "build_logs_to_retain").unwrap();
    assert!(retention < deprecated, "{names:?}");
    assert!(proposals[deprecated].deprecated);
}

struct Failing;

#[async_trait]
impl RepoInfoProvider for Failing {
    async fn owners(&self) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Unavailable("GitHub rate limit exceeded".to_string()))
    }

    async fn repos(&self, _owner: &str) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Unavailable("GitHub rate limit exceeded".to_string()))
    }
}

struct Fixed;

#[async_trait]
impl RepoInfoProvider for Fixed {
    async fn owners(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["acme".to_string(), "spring-projects".to_string()])
    }

    async fn repos(&self, owner: &str) -> Result<Vec<String>, ProviderError> {
        match owner {
            "acme" => Ok(vec!["app".to_string(), "infra".to_string()]),
            _ => Err(ProviderError::OwnerNotFound(owner.to_string())),
        }
    }
}

const GIT_SOURCE: &str = "\
resources:
- name: repo
  type: git
  source:
    uri: ";

#[test]
fn test_failing_provider_reports_its_error() {
    let engine = Engine::new(Providers::none().with_github(Arc::new(Failing)));
    let text = format!("{GIT_SOURCE}https://github.com/");
    let proposals = engine.complete(LanguageId::Pipeline, &text, text.len());
    assert_eq!(labels(&proposals), vec!["GitHub rate limit exceeded"]);
    assert_eq!(proposals[0].kind, ProposalKind::Info);
    assert_eq!(proposals[0].text, "https://github.com/");
}

#[test]
fn test_owner_and_repo_completion() {
    let engine = Engine::new(Providers::none().with_github(Arc::new(Fixed)));

    let text = format!("{GIT_SOURCE}https://github.com/ac");
    let proposals = engine.complete(LanguageId::Pipeline, &text, text.len());
    assert_eq!(labels(&proposals), vec!["https://github.com/acme/"]);

    let text = format!("{GIT_SOURCE}git@github.com:acme/in");
    let proposals = engine.complete(LanguageId::Pipeline, &text, text.len());
    assert_eq!(labels(&proposals), vec!["git@github.com:acme/infra.git"]);
}

fn exact_labels(proposals: &[Proposal]) -> Vec<&str> {
    proposals
        .iter()
        .filter(|p| p.tier == Tier::Exact)
        .map(|p| p.label.as_str())
        .collect()
}

#[test]
fn test_missing_required_properties_inside_job_item() {
    let proposals = complete(LanguageId::Pipeline, "jobs:\n- name: build\n  serial: true\n  ");
    let names = exact_labels(&proposals);
    assert!(names.contains(&"plan"), "{names:?}");
    assert!(!names.contains(&"name"), "{names:?}");
    assert!(!names.contains(&"serial"), "{names:?}");
}

#[test]
fn test_missing_required_properties_inside_resource_item() {
    let text = "resources:\n- name: repo\n  \njobs: []\n";
    let offset = text.find("repo\n  ").unwrap() + "repo\n  ".len();
    let proposals = Engine::default().complete(LanguageId::Pipeline, text, offset);
    let names = exact_labels(&proposals);
    assert!(names.contains(&"type"), "{names:?}");
    assert!(!names.contains(&"name"), "{names:?}");
}

#[test]
fn test_dedented_context_not_offered_when_it_would_split_later_content() {
    let open = "\
jobs:
- name: a
  plan:
  - get: repo
    gr";
    let items = complete(LanguageId::Pipeline, open);
    let names = labels(&items);
    assert!(names.contains(&"← serial_groups"), "{names:?}");
    assert!(names.contains(&"← groups"), "{names:?}");

    let text = format!("{open}\n  serial: true\n");
    let proposals = Engine::default().complete(LanguageId::Pipeline, &text, open.len());
    let names = labels(&proposals);
    assert!(names.contains(&"← serial_groups"), "{names:?}");
    assert!(!names.contains(&"← groups"), "{names:?}");
}
