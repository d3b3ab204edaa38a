use chrono::NaiveDate;
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::{info, warn};

use crate::analysis::stats::{
    commit_activity_endpoint, contributor_stats_endpoint, repos_endpoint,
};
use crate::analysis::{
    rank_contributors, resolve_selector, ActivityAggregator, CalendarGridBuilder, RepoFilter,
    RepoOverview, RepoSummary,
};
use crate::cache::{CacheStore, FileStore, PersistentCache};
use crate::config::Config;
use crate::fetch::{HttpTransport, JsonTransport, ResilientFetcher};
use crate::types::{ActivitySummary, CalendarGrid, Contributor, ContributorSelector, EmptyState};

const GRID_CACHE_SIZE: usize = 16;

/// Outcome of one [`Dashboard::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Repositories selected from the repository list
    pub repositories: usize,
    /// Repositories whose statistics were folded
    pub aggregated: usize,
    /// Repositories with no statistics available, or none that parsed
    pub missing: usize,
    /// Whether the quota ran out while data was still missing
    pub rate_limited: bool,
}

/// One session: fetches an owner's repositories, folds their statistics and
/// serves calendar grids for the selected contributor.
pub struct Dashboard<T: JsonTransport, S: CacheStore> {
    owner: String,
    filter: RepoFilter,
    include_commit_activity: bool,
    fetcher: ResilientFetcher<T, S>,
    aggregator: ActivityAggregator,
    repos: Vec<RepoSummary>,
    selected: ContributorSelector,
    grid_cache: LruCache<(ContributorSelector, NaiveDate), CalendarGrid>,
    last_load: LoadReport,
}

impl Dashboard<HttpTransport, FileStore> {
    /// Dashboard talking to the configured API with an on-disk cache.
    ///
    /// Entries older than six TTL periods are pruned on start.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let transport = HttpTransport::new(config)?;
        let store = FileStore::new(&config.cache_dir).with_quota(config.cache_max_bytes);
        let mut cache =
            PersistentCache::new(store, config.cache_namespace.clone(), config.cache_ttl());
        let pruned = cache.prune();
        if pruned > 0 {
            info!(pruned, "pruned expired cache entries");
        }
        let fetcher = ResilientFetcher::with_options(transport, cache, config.fetcher_options());
        Ok(Self::new(config.owner.clone(), config.repo_filter(), fetcher)
            .with_commit_activity(config.include_commit_activity))
    }
}

impl<T: JsonTransport, S: CacheStore> Dashboard<T, S> {
    pub fn new(owner: impl Into<String>, filter: RepoFilter, fetcher: ResilientFetcher<T, S>) -> Self {
        let capacity = NonZeroUsize::new(GRID_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            owner: owner.into(),
            filter,
            include_commit_activity: false,
            fetcher,
            aggregator: ActivityAggregator::new(),
            repos: Vec::new(),
            selected: ContributorSelector::All,
            grid_cache: LruCache::new(capacity),
            last_load: LoadReport::default(),
        }
    }

    /// Also fold each repository's per-day commit activity feed.
    pub fn with_commit_activity(mut self, enabled: bool) -> Self {
        self.include_commit_activity = enabled;
        self
    }

    /// Fetch the repository list and fold every repository's statistics into a
    /// fresh aggregation. Repositories are fetched one at a time.
    pub async fn load(&mut self, force_refresh: bool) -> LoadReport {
        self.aggregator = ActivityAggregator::new();
        self.grid_cache.clear();
        let mut report = LoadReport::default();

        let Some(payload) = self
            .fetcher
            .fetch(&repos_endpoint(&self.owner, self.filter.max_repositories), force_refresh)
            .await
        else {
            self.repos.clear();
            report.rate_limited = self.fetcher.is_rate_limited();
            warn!(owner = %self.owner, rate_limited = report.rate_limited, "repository list unavailable");
            self.last_load = report.clone();
            return report;
        };

        self.repos = self.filter.apply(RepoSummary::parse_all(&payload));
        report.repositories = self.repos.len();

        for repo in &self.repos {
            let endpoint = contributor_stats_endpoint(&self.owner, &repo.name);
            match self.fetcher.fetch(&endpoint, force_refresh).await {
                Some(stats) => {
                    if self.aggregator.fold_repository(&repo.name, &stats) {
                        report.aggregated += 1;
                    } else if !self.aggregator.is_processed(&repo.name) {
                        report.missing += 1;
                    }
                }
                None => {
                    report.missing += 1;
                    report.rate_limited |= self.fetcher.is_rate_limited();
                }
            }

            if self.include_commit_activity {
                let endpoint = commit_activity_endpoint(&self.owner, &repo.name);
                if let Some(activity) = self.fetcher.fetch(&endpoint, force_refresh).await {
                    self.aggregator.fold_commit_activity(&repo.name, &activity);
                }
            }
        }

        info!(
            owner = %self.owner,
            repositories = report.repositories,
            aggregated = report.aggregated,
            missing = report.missing,
            contributors = self.aggregator.contributors().len(),
            commits = self.aggregator.total_commits(),
            "load complete"
        );
        self.last_load = report.clone();
        report
    }

    pub fn select(&mut self, selector: ContributorSelector) {
        self.selected = selector;
    }

    pub fn selected(&self) -> &ContributorSelector {
        &self.selected
    }

    /// Calendar of the selected activity ending on `today`, memoised until the
    /// next load.
    pub fn grid(&mut self, today: NaiveDate) -> &CalendarGrid {
        let key = (self.selected.clone(), today);
        let selected = &self.selected;
        let aggregator = &self.aggregator;
        self.grid_cache.get_or_insert(key, || {
            CalendarGridBuilder::new(today).build(resolve_selector(selected, aggregator))
        })
    }

    /// Calendar of exact per-day commits across all repositories.
    pub fn daily_commit_grid(&self, today: NaiveDate) -> CalendarGrid {
        CalendarGridBuilder::new(today).build(self.aggregator.daily_commit_activity())
    }

    pub fn ranked_contributors(&self) -> Vec<&Contributor> {
        rank_contributors(self.aggregator.contributors())
    }

    /// Totals for the selected activity, with the reason when there is nothing to show.
    pub fn summary(&mut self, today: NaiveDate) -> ActivitySummary {
        let (window_contributions, active_days) = {
            let grid = self.grid(today);
            (grid.total_contributions, grid.active_days)
        };
        let empty_state = if window_contributions > 0 {
            None
        } else if self.last_load.rate_limited || self.fetcher.is_rate_limited() {
            Some(EmptyState::RateLimited)
        } else {
            Some(EmptyState::NoActivity)
        };

        ActivitySummary {
            repo_count: self.repos.len(),
            contributor_count: self.aggregator.contributors().len(),
            total_commits: self.aggregator.total_commits(),
            active_days,
            window_contributions,
            empty_state,
        }
    }

    pub fn overview(&self) -> RepoOverview {
        RepoOverview::from_repos(&self.repos)
    }

    pub fn repos(&self) -> &[RepoSummary] {
        &self.repos
    }

    pub fn aggregator(&self) -> &ActivityAggregator {
        &self.aggregator
    }

    pub fn fetcher(&self) -> &ResilientFetcher<T, S> {
        &self.fetcher
    }

    pub fn last_load(&self) -> &LoadReport {
        &self.last_load
    }
}
