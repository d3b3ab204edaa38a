//! Folding per-repository weekly statistics into daily activity maps.
//!
//! Every update is a pointwise addition applied to the contributor map and the
//! global map in the same step, so folding repositories in any order yields
//! the same maps and the global count of a date always equals the sum of the
//! contributors' counts for it.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::stats::{CommitActivityWeek, ContributorStats};
use crate::error::RecordError;
use crate::types::{Contributor, DailyActivity};

/// What happened while folding, for logging and empty-state decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    /// Repositories whose contributor statistics were folded
    pub repositories: usize,
    /// Records skipped because they were malformed or had no author
    pub skipped_records: usize,
    /// Week entries skipped for a missing start or non-positive count
    pub skipped_weeks: usize,
    /// Folds ignored because the repository had already been folded
    pub duplicate_repositories: usize,
}

/// Aggregation context for one session.
#[derive(Debug, Clone, Default)]
pub struct ActivityAggregator {
    contributors: Vec<Contributor>,
    index: HashMap<String, usize>,
    global: DailyActivity,
    total_commits: u64,
    processed: HashSet<String>,
    daily_commits: DailyActivity,
    processed_activity: HashSet<String>,
    report: AggregationReport,
}

impl ActivityAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one repository's contributor statistics payload.
    ///
    /// Returns `false` without changing any activity if `repo` was already
    /// folded, or if the payload holds records and none of them parse. The
    /// latter leaves `repo` unfolded so a later, valid payload still counts.
    pub fn fold_repository(&mut self, repo: &str, payload: &Value) -> bool {
        if self.processed.contains(repo) {
            self.report.duplicate_repositories += 1;
            debug!(repo, "repository already aggregated, skipping");
            return false;
        }

        let records = ContributorStats::parse_all(payload);
        if !records.is_empty() && records.iter().all(|record| record.is_err()) {
            for error in records.into_iter().filter_map(Result::err) {
                self.skip_record(repo, error);
            }
            debug!(repo, "no usable statistics records, repository left unfolded");
            return false;
        }
        self.processed.insert(repo.to_string());

        let before = self.total_commits;
        for record in records {
            match record {
                Ok(stats) => self.fold_stats(repo, stats),
                Err(e) => self.skip_record(repo, e),
            }
        }
        self.report.repositories += 1;
        info!(
            repo,
            commits = self.total_commits - before,
            contributors = self.contributors.len(),
            "aggregated repository"
        );
        true
    }

    fn skip_record(&mut self, repo: &str, error: RecordError) {
        self.report.skipped_records += 1;
        debug!(repo, error = %error, "skipping statistics record");
    }

    fn fold_stats(&mut self, repo: &str, stats: ContributorStats) {
        let Some(author) = stats.author else {
            self.skip_record(repo, RecordError::MissingAuthor);
            return;
        };
        let slot = self.contributor_slot(&author.login, author.avatar_url);

        for week in &stats.weeks {
            match week.resolve() {
                Ok((date, count)) => self.record(slot, date, count),
                Err(_) => self.report.skipped_weeks += 1,
            }
        }
    }

    /// Index of the contributor, created with no contributions on first sighting.
    fn contributor_slot(&mut self, login: &str, avatar_url: Option<String>) -> usize {
        if let Some(&slot) = self.index.get(login) {
            let contributor = &mut self.contributors[slot];
            if contributor.avatar_ref.is_none() {
                contributor.avatar_ref = avatar_url;
            }
            return slot;
        }
        let slot = self.contributors.len();
        self.contributors.push(Contributor::new(login, avatar_url));
        self.index.insert(login.to_string(), slot);
        slot
    }

    fn record(&mut self, slot: usize, date: NaiveDate, count: u64) {
        self.contributors[slot].record(date, count);
        *self.global.entry(date).or_insert(0) += count;
        self.total_commits += count;
    }

    /// Fold one repository's per-day commit activity payload into the
    /// repository-level daily map. Returns `false` if already folded.
    pub fn fold_commit_activity(&mut self, repo: &str, payload: &Value) -> bool {
        if !self.processed_activity.insert(repo.to_string()) {
            return false;
        }
        for week in CommitActivityWeek::parse_all(payload) {
            match week {
                Ok(week) => {
                    for (date, count) in week.active_days() {
                        *self.daily_commits.entry(date).or_insert(0) += count;
                    }
                }
                Err(e) => debug!(repo, error = %e, "skipping commit activity week"),
            }
        }
        true
    }

    /// Contributors in discovery order.
    pub fn contributors(&self) -> &[Contributor] {
        &self.contributors
    }

    pub fn contributor(&self, id: &str) -> Option<&Contributor> {
        self.index.get(id).map(|&slot| &self.contributors[slot])
    }

    /// Contributions of everyone, weekly totals attributed to the week start.
    pub fn global_activity(&self) -> &DailyActivity {
        &self.global
    }

    /// Commits per exact day from the commit-activity feed.
    pub fn daily_commit_activity(&self) -> &DailyActivity {
        &self.daily_commits
    }

    pub fn total_commits(&self) -> u64 {
        self.total_commits
    }

    pub fn is_processed(&self, repo: &str) -> bool {
        self.processed.contains(repo)
    }

    pub fn repository_count(&self) -> usize {
        self.processed.len()
    }

    pub fn report(&self) -> &AggregationReport {
        &self.report
    }
}
