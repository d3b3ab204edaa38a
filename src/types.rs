//! # Common Types
//!
//! This module contains the data model shared by the aggregation, calendar and
//! presentation layers: contributors and their daily activity, calendar cells
//! and grids, and the selector that picks which activity map is displayed.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Number of weeks in the trailing calendar window.
pub const WEEKS_IN_WINDOW: usize = 52;

/// Number of days in one calendar column.
pub const DAYS_PER_WEEK: usize = 7;

/// Contribution counts keyed by calendar date.
///
/// A `BTreeMap` keeps dates ordered so two maps built from the same input in a
/// different order compare equal and serialize identically.
pub type DailyActivity = BTreeMap<NaiveDate, u64>;

/// A contributor discovered while folding repository statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contributor {
    /// Login of the contributor, unique within a session
    pub id: String,
    /// Avatar URL as reported upstream, if any
    pub avatar_ref: Option<String>,
    /// Sum of every contribution attributed to this contributor
    pub total_contributions: u64,
    /// Contributions per calendar date
    pub daily_activity: DailyActivity,
}

impl Contributor {
    /// Create a contributor on first sighting, with no contributions yet.
    pub fn new(id: impl Into<String>, avatar_ref: Option<String>) -> Self {
        Self {
            id: id.into(),
            avatar_ref,
            total_contributions: 0,
            daily_activity: DailyActivity::new(),
        }
    }

    /// Add `count` contributions on `date`.
    pub fn record(&mut self, date: NaiveDate, count: u64) {
        *self.daily_activity.entry(date).or_insert(0) += count;
        self.total_contributions += count;
    }
}

/// Bucketed intensity of a single day, used to pick a cell colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum ContributionLevel {
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    VeryHigh = 4,
}

impl ContributionLevel {
    /// Every level, lowest first.
    pub const ALL: [ContributionLevel; 5] = [
        ContributionLevel::None,
        ContributionLevel::Low,
        ContributionLevel::Medium,
        ContributionLevel::High,
        ContributionLevel::VeryHigh,
    ];

    /// Classify a day's count: 0, 1-2, 3-5, 6-10, more than 10.
    pub fn from_count(count: u64) -> Self {
        match count {
            0 => ContributionLevel::None,
            1..=2 => ContributionLevel::Low,
            3..=5 => ContributionLevel::Medium,
            6..=10 => ContributionLevel::High,
            _ => ContributionLevel::VeryHigh,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<ContributionLevel> for u8 {
    fn from(level: ContributionLevel) -> Self {
        level.as_u8()
    }
}

/// One day of the calendar window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub count: u64,
    pub level: ContributionLevel,
    pub is_today: bool,
}

/// A month name anchored to the week column where that month first appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthLabel {
    pub week_index: usize,
    pub month: &'static str,
}

/// A fixed 52 x 7 trailing window of day cells.
///
/// Weeks are ordered oldest first, days oldest first within a week, and the
/// final cell of the final week is always today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarGrid {
    pub weeks: Vec<[DayCell; DAYS_PER_WEEK]>,
    pub month_labels: Vec<MonthLabel>,
    /// Sum of every day count in the window
    pub total_contributions: u64,
    /// Number of days in the window with at least one contribution
    pub active_days: usize,
}

impl CalendarGrid {
    /// Iterate over every cell, oldest first.
    pub fn cells(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flat_map(|week| week.iter())
    }

    /// The cell marked as today.
    pub fn today(&self) -> Option<&DayCell> {
        self.weeks.last().map(|week| &week[DAYS_PER_WEEK - 1])
    }

    /// One slot per week column, holding a month name where a label starts.
    pub fn month_label_row(&self) -> Vec<Option<&'static str>> {
        let mut row = vec![None; self.weeks.len()];
        for label in &self.month_labels {
            if let Some(slot) = row.get_mut(label.week_index) {
                *slot = Some(label.month);
            }
        }
        row
    }

    /// Month names in display order with the empty columns dropped.
    pub fn month_sequence(&self) -> Vec<&'static str> {
        self.month_label_row().into_iter().flatten().collect()
    }
}

/// Which activity map the calendar displays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContributorSelector {
    /// Activity of every contributor combined
    #[default]
    All,
    /// Activity of a single contributor, by login
    Specific(String),
}

impl ContributorSelector {
    pub fn specific(id: impl Into<String>) -> Self {
        ContributorSelector::Specific(id.into())
    }
}

impl FromStr for ContributorSelector {
    type Err = Infallible;

    /// A blank string selects everyone; anything else is a login, including `all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            Ok(ContributorSelector::All)
        } else {
            Ok(ContributorSelector::Specific(trimmed.to_string()))
        }
    }
}

impl fmt::Display for ContributorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributorSelector::All => write!(f, "All"),
            ContributorSelector::Specific(id) => write!(f, "{}", id),
        }
    }
}

/// Why a summary has nothing to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyState {
    /// The upstream quota is exhausted and nothing was cached
    RateLimited,
    /// Data was fetched but no contributions fall in the window
    NoActivity,
}

/// Totals handed to the presentation layer alongside a calendar grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    pub repo_count: usize,
    pub contributor_count: usize,
    pub total_commits: u64,
    pub active_days: usize,
    pub window_contributions: u64,
    pub empty_state: Option<EmptyState>,
}
