//! Fixed-window calendar grid construction.

use chrono::{Datelike, Days, NaiveDate};

use crate::types::{
    CalendarGrid, ContributionLevel, DailyActivity, DayCell, MonthLabel, DAYS_PER_WEEK,
    WEEKS_IN_WINDOW,
};
use crate::utils::month_name;

/// Builds the trailing 52-week window ending on `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarGridBuilder {
    today: NaiveDate,
}

impl CalendarGridBuilder {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// First day of the window (364 days including today).
    pub fn window_start(&self) -> NaiveDate {
        self.days_before_today((WEEKS_IN_WINDOW * DAYS_PER_WEEK - 1) as u64)
    }

    fn days_before_today(&self, days: u64) -> NaiveDate {
        self.today
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Lay `activity` out as 52 weeks of 7 leveled cells. Dates missing from
    /// the map count as zero, so the shape never depends on the input.
    ///
    /// A month label is placed on the first week whose oldest day falls in a
    /// month different from the previous week's; week 0 never gets one.
    pub fn build(&self, activity: &DailyActivity) -> CalendarGrid {
        let mut weeks = Vec::with_capacity(WEEKS_IN_WINDOW);
        let mut month_labels = Vec::new();
        let mut last_month = None;
        let mut total_contributions = 0;
        let mut active_days = 0;

        for week_index in 0..WEEKS_IN_WINDOW {
            let weeks_back = (WEEKS_IN_WINDOW - 1 - week_index) as u64;
            let days_back = weeks_back * DAYS_PER_WEEK as u64;
            let week_start = self.days_before_today(days_back + DAYS_PER_WEEK as u64 - 1);
            let is_last_week = week_index == WEEKS_IN_WINDOW - 1;

            let week: [DayCell; DAYS_PER_WEEK] = std::array::from_fn(|offset| {
                let date = week_start
                    .checked_add_days(Days::new(offset as u64))
                    .unwrap_or(NaiveDate::MAX);
                let count = activity.get(&date).copied().unwrap_or(0);
                DayCell {
                    date,
                    count,
                    level: ContributionLevel::from_count(count),
                    is_today: is_last_week && offset == DAYS_PER_WEEK - 1,
                }
            });

            total_contributions += week.iter().map(|cell| cell.count).sum::<u64>();
            active_days += week.iter().filter(|cell| cell.count > 0).count();

            let month = week_start.month();
            if week_index > 0 && last_month != Some(month) {
                month_labels.push(MonthLabel {
                    week_index,
                    month: month_name(month),
                });
            }
            last_month = Some(month);
            weeks.push(week);
        }

        CalendarGrid {
            weeks,
            month_labels,
            total_contributions,
            active_days,
        }
    }
}
