use async_trait::async_trait;
use pipeline_lsp::providers::{ProviderError, Providers, RepoInfoProvider};
use pipeline_lsp::reconcile::{ProblemCode, Severity};
use pipeline_lsp::{Engine, LanguageId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

struct Throwing;

#[async_trait]
impl RepoInfoProvider for Throwing {
    async fn owners(&self) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".to_string()))
    }

    async fn repos(&self, _owner: &str) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".to_string()))
    }
}

struct Known;

#[async_trait]
impl RepoInfoProvider for Known {
    async fn owners(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["acme".to_string()])
    }

    async fn repos(&self, owner: &str) -> Result<Vec<String>, ProviderError> {
        if owner == "acme" {
            Ok(vec!["app".to_string()])
        } else {
            Err(ProviderError::OwnerNotFound(owner.to_string()))
        }
    }
}

struct Stuck;

#[async_trait]
impl RepoInfoProvider for Stuck {
    async fn owners(&self) -> Result<Vec<String>, ProviderError> {
        std::future::pending::<()>().await;
        Ok(Vec::new())
    }

    async fn repos(&self, _owner: &str) -> Result<Vec<String>, ProviderError> {
        std::future::pending::<()>().await;
        Ok(Vec::new())
    }
}

fn pipeline(uri: &str) -> String {
    format!(
        "\
resources:
- name: repo
  type: git
  source:
    uri: {uri}
jobs:
- name: build
  plan:
  - get: repo
"
    )
}

#[test]
fn test_failing_provider_yields_no_problems() {
    let engine = Engine::new(Providers::none().with_github(Arc::new(Throwing)));
    let text = pipeline("https://github.com/acme/missing.git");
    let problems = engine.reconcile(LanguageId::Pipeline, &text);
    assert!(problems.is_empty(), "{problems:#?}");
}

#[test]
fn test_unknown_repo_and_owner_are_warnings() {
    let engine = Engine::new(Providers::none().with_github(Arc::new(Known)));

    let text = pipeline("https://github.com/acme/missing.git");
    let problems = engine.reconcile(LanguageId::Pipeline, &text);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert_eq!(problems[0].message, "Repo not found: 'missing'");
    assert_eq!(problems[0].severity, Severity::Warning);
    assert_eq!(problems[0].code, ProblemCode::UnknownRepository);
    assert_eq!(&text[problems[0].span.start..problems[0].span.end], "missing");

    let text = pipeline("git@github.com:nobody/app.git");
    let problems = engine.reconcile(LanguageId::Pipeline, &text);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert_eq!(problems[0].message, "User or Organization not found: 'nobody'");
    assert_eq!(&text[problems[0].span.start..problems[0].span.end], "nobody");

    let text = pipeline("git@github.com:acme/app.git");
    assert!(engine.reconcile(LanguageId::Pipeline, &text).is_empty());
}

#[test]
fn test_uri_shape_is_checked_without_provider() {
    let text = pipeline("git@github.com/acme/app.git");
    let problems = Engine::default().reconcile(LanguageId::Pipeline, &text);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert_eq!(problems[0].message, "Expecting a ':'");
    assert_eq!(problems[0].severity, Severity::Error);

    let text = pipeline("https://github.com/acme/app");
    let problems = Engine::default().reconcile(LanguageId::Pipeline, &text);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert_eq!(problems[0].message, "GitHub repo uri should end with '.git'");
}

#[test]
fn test_stuck_provider_is_bounded() {
    let providers = Providers::none()
        .with_github(Arc::new(Stuck))
        .with_timeout(Duration::from_millis(50));
    let engine = Engine::new(providers);

    let started = Instant::now();
    let text = pipeline("https://github.com/ac");
    let offset = text.find("github.com/ac").unwrap() + "github.com/ac".len();
    let proposals = engine.complete(LanguageId::Pipeline, &text, offset);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(proposals.len(), 1);
    assert_eq!(
        proposals[0].label,
        "Timed out waiting for repository information"
    );
}

struct Sluggish {
    answered: Arc<AtomicUsize>,
}

#[async_trait]
impl RepoInfoProvider for Sluggish {
    async fn owners(&self) -> Result<Vec<String>, ProviderError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.answered.fetch_add(1, Ordering::SeqCst);
        Ok(vec!["acme".to_string()])
    }

    async fn repos(&self, _owner: &str) -> Result<Vec<String>, ProviderError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.answered.fetch_add(1, Ordering::SeqCst);
        Ok(vec!["app".to_string()])
    }
}

#[test]
fn test_timed_out_lookups_do_not_keep_running() {
    let answered = Arc::new(AtomicUsize::new(0));
    let providers = Providers::none()
        .with_github(Arc::new(Sluggish {
            answered: Arc::clone(&answered),
        }))
        .with_timeout(Duration::from_millis(20));
    let engine = Engine::new(providers);

    let text = pipeline("https://github.com/ac");
    let offset = text.find("github.com/ac").unwrap() + "github.com/ac".len();
    for _ in 0..5 {
        let proposals = engine.complete(LanguageId::Pipeline, &text, offset);
        assert_eq!(
            proposals[0].label,
            "Timed out waiting for repository information"
        );
    }
    std::thread::sleep(Duration::from_millis(800));
    assert_eq!(answered.load(Ordering::SeqCst), 0);
}
