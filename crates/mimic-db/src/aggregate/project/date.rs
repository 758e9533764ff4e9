//! Calendar component extraction for the date operators. All components
//! are computed in UTC.

use chrono::{DateTime, Datelike, Timelike, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DateComponent {
    DayOfYear,
    DayOfMonth,
    DayOfWeek,
    Year,
    Month,
    Week,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl DateComponent {
    pub(crate) fn extract(self, millis: i64) -> Option<i32> {
        let d = DateTime::<Utc>::from_timestamp_millis(millis)?;
        let v = match self {
            DateComponent::DayOfYear => d.ordinal() as i32,
            DateComponent::DayOfMonth => d.day() as i32,
            DateComponent::DayOfWeek => d.weekday().number_from_sunday() as i32,
            DateComponent::Year => d.year(),
            DateComponent::Month => d.month() as i32,
            // Sunday-based; days before the year's first Sunday are week 0
            DateComponent::Week => {
                ((d.ordinal0() + 7 - d.weekday().num_days_from_sunday()) / 7) as i32
            }
            DateComponent::Hour => d.hour() as i32,
            DateComponent::Minute => d.minute() as i32,
            DateComponent::Second => d.second() as i32,
            DateComponent::Millisecond => d.timestamp_subsec_millis() as i32,
        };
        Some(v)
    }
}
