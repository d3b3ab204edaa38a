//! Upstream wire records and their lenient parsing.
//!
//! Statistics payloads are eventually consistent and occasionally partial, so
//! parsing works per element: a malformed record becomes a [`RecordError`]
//! for that element only and never fails the whole payload.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::RecordError;
use crate::utils::date_from_epoch_seconds;

/// Repository list endpoint for `owner`.
pub fn repos_endpoint(owner: &str, per_page: usize) -> String {
    format!("/users/{}/repos?per_page={}&sort=pushed", owner, per_page)
}

/// Weekly contributor statistics endpoint.
pub fn contributor_stats_endpoint(owner: &str, repo: &str) -> String {
    format!("/repos/{}/{}/stats/contributors", owner, repo)
}

/// Weekly commit activity endpoint (per-day counts).
pub fn commit_activity_endpoint(owner: &str, repo: &str) -> String {
    format!("/repos/{}/{}/stats/commit_activity", owner, repo)
}

/// One entry of the repository list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoSummary {
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub has_pages: bool,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RepoSummary {
    /// Parse a repository list, dropping entries that do not parse.
    pub fn parse_all(payload: &Value) -> Vec<RepoSummary> {
        payload
            .as_array()
            .map(|repos| {
                repos
                    .iter()
                    .filter_map(|repo| RepoSummary::deserialize(repo).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Which repositories take part in aggregation.
#[derive(Debug, Clone, Copy)]
pub struct RepoFilter {
    pub include_archived: bool,
    pub include_forks: bool,
    pub max_repositories: usize,
}

impl RepoFilter {
    pub fn apply(&self, repos: Vec<RepoSummary>) -> Vec<RepoSummary> {
        repos
            .into_iter()
            .filter(|repo| self.include_archived || !repo.archived)
            .filter(|repo| self.include_forks || !repo.fork)
            .take(self.max_repositories)
            .collect()
    }
}

/// Headline numbers for a set of repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoOverview {
    pub repo_count: usize,
    pub total_stars: u64,
    pub total_forks: u64,
    /// Primary languages, most common first, ties alphabetical
    pub languages: Vec<(String, usize)>,
    /// Name of the most recently pushed repository
    pub most_recent: Option<String>,
}

impl RepoOverview {
    pub fn from_repos(repos: &[RepoSummary]) -> Self {
        let mut languages: HashMap<&str, usize> = HashMap::new();
        for language in repos.iter().filter_map(|r| r.language.as_deref()) {
            *languages.entry(language).or_insert(0) += 1;
        }
        let mut languages: Vec<(String, usize)> = languages
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        languages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            repo_count: repos.len(),
            total_stars: repos.iter().map(|r| r.stargazers_count).sum(),
            total_forks: repos.iter().map(|r| r.forks_count).sum(),
            languages,
            most_recent: repos
                .iter()
                .filter(|r| r.pushed_at.is_some())
                .max_by_key(|r| r.pushed_at)
                .map(|r| r.name.clone()),
        }
    }
}

/// Identity of a contributor as reported by the statistics feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsAuthor {
    pub login: String,
    pub avatar_url: Option<String>,
}

/// One week of one contributor (`w` and `c` of the feed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRecord {
    pub week_start: Option<i64>,
    pub commits: Option<i64>,
}

impl WeekRecord {
    fn from_value(value: &Value) -> Self {
        Self {
            week_start: value.get("w").and_then(Value::as_i64),
            commits: value.get("c").and_then(Value::as_i64),
        }
    }

    /// The UTC date the week starts on and its positive commit count.
    pub fn resolve(&self) -> Result<(NaiveDate, u64), RecordError> {
        let start = self.week_start.ok_or(RecordError::MissingWeekStart)?;
        let count = match self.commits {
            Some(c) if c > 0 => c as u64,
            _ => return Err(RecordError::NonPositiveCount),
        };
        let date = date_from_epoch_seconds(start).ok_or(RecordError::InvalidWeekStart(start))?;
        Ok((date, count))
    }
}

/// Weekly statistics of one contributor in one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorStats {
    pub author: Option<StatsAuthor>,
    pub total: Option<u64>,
    pub weeks: Vec<WeekRecord>,
}

impl ContributorStats {
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let record = value.as_object().ok_or(RecordError::Malformed)?;
        let author = record.get("author").and_then(|author| {
            let login = author.get("login")?.as_str()?.trim();
            if login.is_empty() {
                return None;
            }
            Some(StatsAuthor {
                login: login.to_string(),
                avatar_url: author
                    .get("avatar_url")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        });
        let weeks = record
            .get("weeks")
            .and_then(Value::as_array)
            .map(|weeks| weeks.iter().map(WeekRecord::from_value).collect())
            .unwrap_or_default();

        Ok(Self {
            author,
            total: record.get("total").and_then(Value::as_u64),
            weeks,
        })
    }

    /// Parse every element of a statistics payload. `null` yields nothing and
    /// any other non-array shape yields a single malformed entry.
    pub fn parse_all(payload: &Value) -> Vec<Result<Self, RecordError>> {
        match payload {
            Value::Array(records) => records.iter().map(Self::from_value).collect(),
            Value::Null => Vec::new(),
            _ => vec![Err(RecordError::Malformed)],
        }
    }
}

/// One week of the commit-activity feed: seven per-day counts from `week`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitActivityWeek {
    pub week_start: NaiveDate,
    pub days: Vec<u64>,
}

impl CommitActivityWeek {
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let start = value
            .get("week")
            .and_then(Value::as_i64)
            .ok_or(RecordError::MissingWeekStart)?;
        let week_start =
            date_from_epoch_seconds(start).ok_or(RecordError::InvalidWeekStart(start))?;
        let days = value
            .get("days")
            .and_then(Value::as_array)
            .ok_or(RecordError::Malformed)?
            .iter()
            .take(7)
            .map(|day| day.as_u64().unwrap_or(0))
            .collect();
        Ok(Self { week_start, days })
    }

    pub fn parse_all(payload: &Value) -> Vec<Result<Self, RecordError>> {
        match payload {
            Value::Array(weeks) => weeks.iter().map(Self::from_value).collect(),
            Value::Null => Vec::new(),
            _ => vec![Err(RecordError::Malformed)],
        }
    }

    /// Non-zero days as (date, count).
    pub fn active_days(&self) -> impl Iterator<Item = (NaiveDate, u64)> + '_ {
        self.days
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .filter_map(|(offset, count)| {
                let date = self.week_start.checked_add_days(Days::new(offset as u64))?;
                Some((date, *count))
            })
    }
}
