//! Scalar value grammars.

use std::sync::LazyLock;

use regex::Regex;

use crate::providers::{ProviderError, Providers};
use crate::reconcile::Severity;

/// A problem inside a scalar value. Offsets are relative to the value text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueProblem {
    pub message: String,
    pub severity: Severity,
    pub range: Option<(usize, usize)>,
}

impl ValueProblem {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
            range: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    pub fn at(mut self, start: usize, end: usize) -> Self {
        self.range = Some((start, end));
        self
    }
}

pub struct ValueContext<'a> {
    pub providers: &'a Providers,
}

/// Validates the text of a scalar.
pub trait ValueParser: Send + Sync {
    fn check(&self, value: &str, ctx: &ValueContext<'_>) -> Vec<ValueProblem>;

    /// Literal values worth proposing in completion.
    fn values(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A proposed scalar value. `text` replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueProposal {
    pub text: String,
    pub label: String,
}

/// Computes values for the scalar being typed.
pub trait ValueCompleter: Send + Sync {
    fn complete(&self, prefix: &str, ctx: &ValueContext<'_>) -> Result<Vec<ValueProposal>, String>;
}

pub struct EnumParser {
    type_name: String,
    values: Vec<String>,
}

impl EnumParser {
    pub fn new(type_name: &str, values: &[&str]) -> Self {
        Self {
            type_name: type_name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl ValueParser for EnumParser {
    fn check(&self, value: &str, _ctx: &ValueContext<'_>) -> Vec<ValueProblem> {
        if self.values.iter().any(|v| v == value) {
            return Vec::new();
        }
        let mut sorted = self.values.clone();
        sorted.sort();
        vec![ValueProblem::error(format!(
            "'{value}' is an unknown '{}'. Valid values are: [{}]",
            self.type_name,
            sorted.join(", ")
        ))]
    }

    fn values(&self) -> Vec<String> {
        self.values.clone()
    }
}

pub fn boolean() -> EnumParser {
    EnumParser::new("boolean", &["true", "false"])
}

pub struct IntegerParser {
    min: Option<i64>,
}

impl IntegerParser {
    pub fn new() -> Self {
        Self { min: None }
    }

    pub fn at_least(min: i64) -> Self {
        Self { min: Some(min) }
    }
}

impl Default for IntegerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueParser for IntegerParser {
    fn check(&self, value: &str, _ctx: &ValueContext<'_>) -> Vec<ValueProblem> {
        match value.parse::<i64>() {
            Err(_) => vec![ValueProblem::error(format!(
                "'{value}' is not a valid 'Integer'"
            ))],
            Ok(n) => match self.min {
                Some(min) if n < min => {
                    vec![ValueProblem::error(format!("Value must be at least {min}"))]
                }
                _ => Vec::new(),
            },
        }
    }
}

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?([0-9]+(\.[0-9]*)?(ns|us|µs|ms|s|m|h))+$").expect("duration regex")
});

/// Go-style durations such as `1h30m`, plus optional keywords.
pub struct DurationParser {
    keywords: Vec<&'static str>,
}

impl DurationParser {
    pub fn new() -> Self {
        Self {
            keywords: Vec::new(),
        }
    }

    pub fn or_keywords(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
        }
    }
}

impl Default for DurationParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueParser for DurationParser {
    fn check(&self, value: &str, _ctx: &ValueContext<'_>) -> Vec<ValueProblem> {
        if value == "0" || self.keywords.contains(&value) || DURATION.is_match(value) {
            Vec::new()
        } else {
            vec![ValueProblem::error(format!(
                "'{value}' is not a valid 'Duration'"
            ))]
        }
    }

    fn values(&self) -> Vec<String> {
        self.keywords.iter().map(|k| k.to_string()).collect()
    }
}

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(:(\d{2}))?\s*([AaPp][Mm])?(\s*[+-]\d{4})?$").expect("time regex")
});

/// Times of day: `3:04 PM`, `15:04`, `3PM`, optionally with a `-0700` offset.
pub struct TimeParser;

impl ValueParser for TimeParser {
    fn check(&self, value: &str, _ctx: &ValueContext<'_>) -> Vec<ValueProblem> {
        let invalid = || vec![ValueProblem::error(format!("'{value}' is not a valid 'Time'"))];
        let Some(caps) = TIME.captures(value.trim()) else {
            return invalid();
        };
        let hour: u32 = caps[1].parse().unwrap_or(99);
        let minute: u32 = caps.get(3).map_or(Ok(0), |m| m.as_str().parse()).unwrap_or(99);
        let meridiem = caps.get(4).is_some();
        if caps.get(2).is_none() && !meridiem {
            return invalid();
        }
        let max_hour = if meridiem { 12 } else { 23 };
        if hour > max_hour || minute > 59 || (meridiem && hour == 0) {
            return invalid();
        }
        Vec::new()
    }
}

pub struct RegexParser;

impl ValueParser for RegexParser {
    fn check(&self, value: &str, _ctx: &ValueContext<'_>) -> Vec<ValueProblem> {
        match Regex::new(value) {
            Ok(_) => Vec::new(),
            Err(e) => {
                let detail = e.to_string();
                let last = detail.lines().last().unwrap_or("").trim().to_string();
                vec![ValueProblem::error(format!(
                    "'{value}' is not a valid regular expression: {last}"
                ))]
            }
        }
    }
}

pub const GITHUB_PREFIXES: [&str; 2] = ["git@github.com:", "https://github.com/"];

/// Shape and existence checks for GitHub repository URIs. Other hosts are
/// not inspected.
pub struct GithubUriParser;

impl GithubUriParser {
    fn split(value: &str) -> Option<(usize, &str)> {
        for prefix in GITHUB_PREFIXES {
            if let Some(rest) = value.strip_prefix(prefix) {
                return Some((prefix.len(), rest));
            }
        }
        None
    }
}

impl ValueParser for GithubUriParser {
    fn check(&self, value: &str, ctx: &ValueContext<'_>) -> Vec<ValueProblem> {
        let mut problems = Vec::new();
        // Right host, wrong separator.
        for (host, expected, wrong) in [("git@github.com", ':', '/'), ("https://github.com", '/', ':')] {
            if let Some(rest) = value.strip_prefix(host)
                && rest.starts_with(wrong)
            {
                let at = host.len();
                problems.push(ValueProblem::error(format!("Expecting a '{expected}'")).at(at, at + 1));
                return problems;
            }
        }
        let Some((offset, path)) = Self::split(value) else {
            return problems;
        };
        let bare = match path.strip_suffix(".git") {
            Some(bare) => bare,
            None => {
                let end = value.len();
                let start = value[..end]
                    .char_indices()
                    .last()
                    .map_or(end, |(i, _)| i);
                problems.push(ValueProblem::error("GitHub repo uri should end with '.git'").at(start, end));
                path
            }
        };
        let Some((owner, repo)) = bare.split_once('/').filter(|(o, r)| {
            !o.is_empty() && !r.is_empty() && !r.contains('/')
        }) else {
            problems.push(
                ValueProblem::error("Expecting something of the form '${owner}/${repo}'")
                    .at(offset, offset + bare.len()),
            );
            return problems;
        };
        let owner_start = offset;
        let repo_start = offset + owner.len() + 1;
        match ctx.providers.github_repos(owner) {
            Ok(repos) => {
                if !repos.iter().any(|r| r == repo) {
                    problems.push(
                        ValueProblem::warning(format!("Repo not found: '{repo}'"))
                            .at(repo_start, repo_start + repo.len()),
                    );
                }
            }
            Err(e @ ProviderError::OwnerNotFound(_)) => {
                problems.push(
                    ValueProblem::warning(e.to_string()).at(owner_start, owner_start + owner.len()),
                );
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping GitHub repository check");
            }
        }
        problems
    }
}

/// Proposes GitHub URI prefixes, owners and repositories.
pub struct GithubUriCompleter;

impl ValueCompleter for GithubUriCompleter {
    fn complete(&self, prefix: &str, ctx: &ValueContext<'_>) -> Result<Vec<ValueProposal>, String> {
        let proposal = |text: String| ValueProposal {
            label: text.clone(),
            text,
        };
        let Some((offset, path)) = GithubUriParser::split(prefix) else {
            return Ok(GITHUB_PREFIXES
                .iter()
                .filter(|p| is_subsequence(prefix, p))
                .map(|p| proposal(p.to_string()))
                .collect());
        };
        let uri_prefix = &prefix[..offset];
        match path.split_once('/') {
            None => {
                let owners = ctx.providers.github_owners().map_err(|e| e.to_string())?;
                Ok(owners
                    .into_iter()
                    .filter(|o| is_subsequence(path, o))
                    .map(|o| proposal(format!("{uri_prefix}{o}/")))
                    .collect())
            }
            Some((owner, partial)) => {
                let repos = ctx.providers.github_repos(owner).map_err(|e| e.to_string())?;
                Ok(repos
                    .into_iter()
                    .filter(|r| is_subsequence(partial, r))
                    .map(|r| proposal(format!("{uri_prefix}{owner}/{r}.git")))
                    .collect())
            }
        }
    }
}

/// Case-insensitive subsequence match used for filtering proposals.
pub fn is_subsequence(query: &str, candidate: &str) -> bool {
    let mut chars = candidate.chars().flat_map(char::to_lowercase);
    query
        .chars()
        .flat_map(char::to_lowercase)
        .all(|q| chars.any(|c| c == q))
}
