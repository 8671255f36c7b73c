use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use super::{ProviderError, RepoInfoProvider};

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

/// Repository lookups against the GitHub REST API.
///
/// Answers are cached per owner for `ttl`.
pub struct GithubProvider {
    client: reqwest::Client,
    api: String,
    token: Option<String>,
    ttl: Duration,
    repos: DashMap<String, (Instant, Result<Vec<String>, ProviderError>)>,
    owners: DashMap<(), (Instant, Vec<String>)>,
}

impl GithubProvider {
    pub fn new(api: impl Into<String>, token: Option<String>, ttl: Duration, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pipeline-lsp/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            client,
            api: api.into().trim_end_matches('/').to_string(),
            token,
            ttl,
            repos: DashMap::new(),
            owners: DashMap::new(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<Option<T>, ProviderError> {
        let mut request = self
            .client
            .get(format!("{}{}", self.api, path))
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Unavailable(e.to_string())
            }
        })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        let body = response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(Some(body))
    }

    async fn fetch_repos(&self, owner: &str) -> Result<Vec<String>, ProviderError> {
        let repos: Option<Vec<Repo>> = self
            .get_json(&format!("/users/{owner}/repos?per_page=100"))
            .await?;
        match repos {
            Some(repos) => Ok(repos.into_iter().map(|r| r.name).collect()),
            None => Err(ProviderError::OwnerNotFound(owner.to_string())),
        }
    }

    async fn fetch_owners(&self) -> Result<Vec<String>, ProviderError> {
        if self.token.is_none() {
            return Err(ProviderError::Unavailable(
                "Set PIPELINE_LSP_GITHUB_TOKEN to suggest GitHub owners".to_string(),
            ));
        }
        let mut owners = Vec::new();
        if let Some(user) = self.get_json::<Account>("/user").await? {
            owners.push(user.login);
        }
        if let Some(orgs) = self.get_json::<Vec<Account>>("/user/orgs").await? {
            owners.extend(orgs.into_iter().map(|o| o.login));
        }
        owners.sort();
        owners.dedup();
        Ok(owners)
    }
}

#[async_trait]
impl RepoInfoProvider for GithubProvider {
    async fn owners(&self) -> Result<Vec<String>, ProviderError> {
        let cached = self
            .owners
            .get(&())
            .and_then(|entry| (entry.0.elapsed() < self.ttl).then(|| entry.1.clone()));
        if let Some(owners) = cached {
            return Ok(owners);
        }
        let owners = self.fetch_owners().await?;
        self.owners.insert((), (Instant::now(), owners.clone()));
        Ok(owners)
    }

    async fn repos(&self, owner: &str) -> Result<Vec<String>, ProviderError> {
        let cached = self
            .repos
            .get(owner)
            .and_then(|entry| (entry.0.elapsed() < self.ttl).then(|| entry.1.clone()));
        if let Some(result) = cached {
            return result;
        }
        let result = self.fetch_repos(owner).await;
        // Transient failures are not cached.
        if matches!(result, Ok(_) | Err(ProviderError::OwnerNotFound(_))) {
            self.repos
                .insert(owner.to_string(), (Instant::now(), result.clone()));
        }
        tracing::debug!(owner, ok = result.is_ok(), "fetched GitHub repositories");
        result
    }
}
