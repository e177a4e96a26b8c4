//! Calendar helpers for monthly billing periods.
//!
//! Billing periods are calendar months, represented as the first day of
//! the month.

use chrono::{Datelike, NaiveDate};

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("first of month is valid")
}

/// First day of the month after the month containing `date`.
pub fn next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is valid")
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    let start = month_start(date);
    next_month(start).signed_duration_since(start).num_days() as u32
}

/// Due date in the month after `reference_month`, preserving `desired_day`
/// clamped to the length of the target month.
pub fn next_due_date(desired_day: u32, reference_month: NaiveDate) -> NaiveDate {
    let target = next_month(month_start(reference_month));
    let day = desired_day.min(days_in_month(target));
    NaiveDate::from_ymd_opt(target.year(), target.month(), day).expect("clamped day fits month")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_start_truncates_day() {
        assert_eq!(month_start(date(2025, 3, 17)), date(2025, 3, 1));
    }

    #[test]
    fn next_month_rolls_over_year() {
        assert_eq!(next_month(date(2025, 12, 15)), date(2026, 1, 1));
        assert_eq!(next_month(date(2025, 1, 1)), date(2025, 2, 1));
    }

    #[test]
    fn due_day_is_preserved_when_it_fits() {
        assert_eq!(next_due_date(15, date(2025, 3, 1)), date(2025, 4, 15));
    }

    #[test]
    fn due_day_is_clamped_to_shorter_months() {
        // January 31st -> February 28th (non-leap) or 29th (leap)
        assert_eq!(next_due_date(31, date(2025, 1, 1)), date(2025, 2, 28));
        assert_eq!(next_due_date(31, date(2024, 1, 1)), date(2024, 2, 29));
        // March 31st -> April 30th
        assert_eq!(next_due_date(31, date(2025, 3, 1)), date(2025, 4, 30));
    }

    #[test]
    fn days_in_month_handles_february() {
        assert_eq!(days_in_month(date(2025, 2, 10)), 28);
        assert_eq!(days_in_month(date(2024, 2, 10)), 29);
        assert_eq!(days_in_month(date(2025, 4, 1)), 30);
        assert_eq!(days_in_month(date(2025, 7, 1)), 31);
    }
}
