use chrono::{DateTime, Months, Utc};

pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// `from` plus one calendar month, clamped to the end of shorter months
/// (Jan 31 -> Feb 28/29).
pub fn one_month_after(from: DateTime<Utc>) -> DateTime<Utc> {
    from.checked_add_months(Months::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn is_expired(expires_at: i64, current_time: i64) -> bool {
    current_time >= expires_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_current_timestamp() {
        let ts = current_timestamp();
        // Should be a reasonable timestamp (after 2020-01-01)
        assert!(ts > 1577836800);
        // Should be before 2100-01-01
        assert!(ts < 4102444800);
    }

    #[test]
    fn test_one_month_after() {
        let start = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(
            one_month_after(start),
            Utc.with_ymd_and_hms(2024, 4, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_one_month_after_clamps_month_end() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(
            one_month_after(start),
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_is_expired() {
        assert!(!is_expired(1000, 999));
        assert!(is_expired(1000, 1000));
        assert!(is_expired(1000, 1001));
    }
}
