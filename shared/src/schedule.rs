//! Weekly meeting-date derivation.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::{Error, Result};

/// Weekday the congregation holds its midweek meeting.
pub const MEETING_WEEKDAY: Weekday = Weekday::Thu;

/// Parse an ISO `YYYY-MM-DD` date from client input.
pub fn parse_iso_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::Validation(format!("{} must be a YYYY-MM-DD date", field)))
}

/// All dates falling on `weekday` within `[start, end]`, in order.
///
/// Errors when the bounds are inverted; an in-range span that simply contains
/// no such weekday yields an empty list.
pub fn weekly_dates(start: NaiveDate, end: NaiveDate, weekday: Weekday) -> Result<Vec<NaiveDate>> {
    if start > end {
        return Err(Error::Validation(
            "start_date must not be after end_date".to_string(),
        ));
    }

    // Advance to the first occurrence of the weekday on or after start.
    let offset = (7 + weekday.num_days_from_monday() - start.weekday().num_days_from_monday()) % 7;
    let mut date = start + Days::new(u64::from(offset));

    let mut dates = Vec::new();
    while date <= end {
        dates.push(date);
        date = date + Days::new(7);
    }
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_thursdays_in_quarter() {
        // Jan-Mar 2025 has 13 Thursdays, starting Jan 2.
        let dates = weekly_dates(d("2025-01-01"), d("2025-03-31"), Weekday::Thu).unwrap();
        assert_eq!(dates.len(), 13);
        assert_eq!(dates[0], d("2025-01-02"));
        assert_eq!(dates[12], d("2025-03-27"));
        assert!(dates.iter().all(|date| date.weekday() == Weekday::Thu));
    }

    #[test]
    fn test_inclusive_bounds() {
        // Both bounds are Thursdays themselves.
        let dates = weekly_dates(d("2025-01-02"), d("2025-01-09"), Weekday::Thu).unwrap();
        assert_eq!(dates, vec![d("2025-01-02"), d("2025-01-09")]);
    }

    #[test]
    fn test_range_without_weekday() {
        // Friday through Wednesday contains no Thursday.
        let dates = weekly_dates(d("2025-01-03"), d("2025-01-08"), Weekday::Thu).unwrap();
        assert!(dates.is_empty());
    }

    #[test]
    fn test_single_day_range() {
        let dates = weekly_dates(d("2025-01-02"), d("2025-01-02"), Weekday::Thu).unwrap();
        assert_eq!(dates, vec![d("2025-01-02")]);
    }

    #[test]
    fn test_inverted_bounds() {
        let err = weekly_dates(d("2025-03-31"), d("2025-01-01"), Weekday::Thu).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_iso_date("start_date", "2025-01-02").unwrap(), d("2025-01-02"));
        assert!(parse_iso_date("start_date", "01/02/2025").is_err());
        assert!(parse_iso_date("start_date", "").is_err());
    }
}
