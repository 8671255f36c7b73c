use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;
use crate::providers::{GithubProvider, Providers};

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(PipelineError::ConfigError(format!(
                "unknown log format '{other}', expected 'text' or 'json'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Quiet period after an edit before the document is checked.
    pub debounce: Duration,
    /// Longest wait for a repository lookup.
    pub provider_timeout: Duration,
    pub github_token: Option<String>,
    pub github_api: String,
    pub cache_ttl: Duration,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            provider_timeout: Duration::from_millis(1500),
            github_token: None,
            github_api: DEFAULT_GITHUB_API.to_string(),
            cache_ttl: Duration::from_secs(600),
            log_format: LogFormat::Text,
        }
    }
}

fn number(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            // tracing is not set up yet while the config loads
            eprintln!("{name}: invalid number '{raw}', using {default}");
            default
        }),
        Err(_) => default,
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let github_token = std::env::var("PIPELINE_LSP_GITHUB_TOKEN")
            .or_else(|_| std::env::var("GITHUB_TOKEN"))
            .ok()
            .filter(|t| !t.trim().is_empty());

        let log_format = match std::env::var("PIPELINE_LSP_LOG_FORMAT") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: PipelineError| {
                eprintln!("{e}; using text");
                LogFormat::Text
            }),
            Err(_) => LogFormat::Text,
        };

        Self {
            debounce: Duration::from_millis(number("PIPELINE_LSP_DEBOUNCE_MS", 300)),
            provider_timeout: Duration::from_millis(number("PIPELINE_LSP_PROVIDER_TIMEOUT_MS", 1500)),
            github_token,
            github_api: std::env::var("PIPELINE_LSP_GITHUB_API").unwrap_or(defaults.github_api),
            cache_ttl: Duration::from_secs(number("PIPELINE_LSP_CACHE_TTL_SECS", 600)),
            log_format,
        }
    }

    /// Providers backed by the configured services.
    pub fn providers(&self) -> Providers {
        let github = GithubProvider::new(
            self.github_api.as_str(),
            self.github_token.clone(),
            self.cache_ttl,
            self.provider_timeout,
        );
        tracing::debug!(api = %self.github_api, token = self.github_token.is_some(), "GitHub lookups enabled");
        Providers::none()
            .with_timeout(self.provider_timeout)
            .with_github(Arc::new(github))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.provider_timeout, Duration::from_millis(1500));
        assert_eq!(config.github_api, DEFAULT_GITHUB_API);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!(matches!(
            "xml".parse::<LogFormat>(),
            Err(PipelineError::ConfigError(_))
        ));
    }
}
