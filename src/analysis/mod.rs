mod aggregate;
mod calendar;
mod ranking;
pub mod stats;

pub use aggregate::{ActivityAggregator, AggregationReport};
pub use calendar::CalendarGridBuilder;
pub use ranking::{rank_contributors, resolve_selector, selector_options};
pub use stats::{ContributorStats, RepoFilter, RepoOverview, RepoSummary};
