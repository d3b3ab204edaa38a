//! Contributor ordering and selector resolution.

use super::aggregate::ActivityAggregator;
use crate::types::{Contributor, ContributorSelector, DailyActivity};

static EMPTY_ACTIVITY: DailyActivity = DailyActivity::new();

/// Contributors by total contributions, highest first. Ties keep discovery order.
pub fn rank_contributors(contributors: &[Contributor]) -> Vec<&Contributor> {
    let mut ranked: Vec<&Contributor> = contributors.iter().collect();
    ranked.sort_by(|a, b| b.total_contributions.cmp(&a.total_contributions));
    ranked
}

/// The activity map a selector refers to.
///
/// `All` borrows the global map. An unknown contributor resolves to an empty map.
pub fn resolve_selector<'a>(
    selector: &ContributorSelector,
    aggregator: &'a ActivityAggregator,
) -> &'a DailyActivity {
    match selector {
        ContributorSelector::All => aggregator.global_activity(),
        ContributorSelector::Specific(id) => aggregator
            .contributor(id)
            .map(|contributor| &contributor.daily_activity)
            .unwrap_or(&EMPTY_ACTIVITY),
    }
}

/// Selector choices for a picker: `All` first, then contributors by rank.
pub fn selector_options(ranked: &[&Contributor]) -> Vec<ContributorSelector> {
    std::iter::once(ContributorSelector::All)
        .chain(
            ranked
                .iter()
                .map(|contributor| ContributorSelector::specific(contributor.id.clone())),
        )
        .collect()
}
