//! Lookups backed by remote services.
//!
//! Providers are optional. Every call goes through [`Providers`], which
//! bounds the wait so a slow service degrades to "no information".
pub mod github;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime};

pub use github::GithubProvider;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("User or Organization not found: '{0}'")]
    OwnerNotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Timed out waiting for repository information")]
    Timeout,
}

/// Source of repository names for one hosting service.
#[async_trait]
pub trait RepoInfoProvider: Send + Sync {
    /// Owners (users and organizations) worth suggesting.
    async fn owners(&self) -> Result<Vec<String>, ProviderError>;

    /// Repository names belonging to `owner`.
    async fn repos(&self, owner: &str) -> Result<Vec<String>, ProviderError>;
}

/// The set of providers available to analysis, plus the wait bound.
#[derive(Clone)]
pub struct Providers {
    github: Option<Arc<dyn RepoInfoProvider>>,
    timeout: Duration,
}

impl Default for Providers {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("github", &self.github.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Providers {
    pub fn none() -> Self {
        Self {
            github: None,
            timeout: Duration::from_millis(1500),
        }
    }

    pub fn with_github(mut self, provider: Arc<dyn RepoInfoProvider>) -> Self {
        self.github = Some(provider);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_github(&self) -> bool {
        self.github.is_some()
    }

    pub fn github_owners(&self) -> Result<Vec<String>, ProviderError> {
        let provider = self.github()?;
        self.bounded(async move { provider.owners().await })
    }

    pub fn github_repos(&self, owner: &str) -> Result<Vec<String>, ProviderError> {
        let provider = self.github()?;
        self.bounded(async move { provider.repos(owner).await })
    }

    fn github(&self) -> Result<Arc<dyn RepoInfoProvider>, ProviderError> {
        self.github
            .clone()
            .ok_or_else(|| ProviderError::Unavailable("No GitHub provider configured".to_string()))
    }

    /// Drives a provider call to completion or until the configured
    /// timeout, whichever comes first. A timed out call is dropped along
    /// with its pending request.
    ///
    /// Analysis is synchronous, so this blocks the calling thread. It must
    /// run off the async executor (`spawn_blocking` or a plain thread).
    fn bounded<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let handle = runtime()?;
        handle.block_on(async {
            match tokio::time::timeout(self.timeout, call).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(timeout = ?self.timeout, "repository provider timed out");
                    Err(ProviderError::Timeout)
                }
            }
        })
    }
}

/// The ambient runtime when there is one, else a shared background runtime
/// for callers outside tokio (CLI tests, library users).
fn runtime() -> Result<Handle, ProviderError> {
    if let Ok(handle) = Handle::try_current() {
        return Ok(handle);
    }
    static SHARED: OnceLock<Option<Runtime>> = OnceLock::new();
    SHARED
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("repo-info")
                .enable_all()
                .build()
                .inspect_err(|e| tracing::warn!(error = %e, "cannot start repository lookup runtime"))
                .ok()
        })
        .as_ref()
        .map(|runtime| runtime.handle().clone())
        .ok_or_else(|| ProviderError::Unavailable("Repository lookups are unavailable".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Slow {
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RepoInfoProvider for Slow {
        async fn owners(&self) -> Result<Vec<String>, ProviderError> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["late".to_string()])
        }

        async fn repos(&self, _owner: &str) -> Result<Vec<String>, ProviderError> {
            Ok(vec!["repo".to_string()])
        }
    }

    #[test]
    fn test_slow_provider_times_out() {
        let finished = Arc::new(AtomicUsize::new(0));
        let providers = Providers::none()
            .with_github(Arc::new(Slow {
                finished: Arc::clone(&finished),
            }))
            .with_timeout(Duration::from_millis(20));
        assert_eq!(providers.github_owners(), Err(ProviderError::Timeout));
        assert_eq!(providers.github_repos("x"), Ok(vec!["repo".to_string()]));
    }

    #[test]
    fn test_timed_out_calls_are_dropped() {
        let finished = Arc::new(AtomicUsize::new(0));
        let providers = Providers::none()
            .with_github(Arc::new(Slow {
                finished: Arc::clone(&finished),
            }))
            .with_timeout(Duration::from_millis(20));
        for _ in 0..5 {
            assert_eq!(providers.github_owners(), Err(ProviderError::Timeout));
        }
        std::thread::sleep(Duration::from_millis(800));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_calls_from_blocking_pool_use_ambient_runtime() {
        let finished = Arc::new(AtomicUsize::new(0));
        let providers = Providers::none()
            .with_github(Arc::new(Slow {
                finished: Arc::clone(&finished),
            }))
            .with_timeout(Duration::from_secs(2));
        let owners = tokio::task::spawn_blocking(move || providers.github_owners())
            .await
            .unwrap();
        assert_eq!(owners, Ok(vec!["late".to_string()]));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_provider_is_unavailable() {
        let providers = Providers::none();
        assert!(matches!(
            providers.github_owners(),
            Err(ProviderError::Unavailable(_))
        ));
    }
}
