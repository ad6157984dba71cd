use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// The next `count` weekdays strictly after `last`. Exchange holidays are
/// not excluded.
pub fn business_days_after(last: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(count);
    let mut day = last;
    while out.len() < count {
        day += Duration::days(1);
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_skips_weekend() {
        // 2024-01-05 is a Friday
        assert_eq!(business_days_after(d(2024, 1, 5), 2), vec![d(2024, 1, 8), d(2024, 1, 9)]);
    }

    #[test]
    fn test_from_saturday() {
        assert_eq!(business_days_after(d(2024, 1, 6), 1), vec![d(2024, 1, 8)]);
    }

    #[test]
    fn test_zero_count() {
        assert!(business_days_after(d(2024, 1, 6), 0).is_empty());
    }
}
