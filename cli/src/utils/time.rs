//! Time utility functions

use chrono::NaiveDateTime;

/// Timestamp layout used inside apache log brackets, offset excluded
pub const APACHE_TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S";

/// Truncate an epoch-seconds timestamp down to its bucket start
pub fn floor_to_bucket(epoch_secs: i64, bucket_secs: i64) -> i64 {
    epoch_secs.div_euclid(bucket_secs) * bucket_secs
}

/// Parse the bracketed apache timestamp (without the timezone offset)
pub fn parse_apache_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, APACHE_TIMESTAMP_FORMAT).ok()
}

/// Format a timestamp back into the apache bracket layout
pub fn format_apache_timestamp(value: &NaiveDateTime) -> String {
    value.format(APACHE_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_floor_to_bucket_hour() {
        // 2019-07-17 23:40:31 UTC = 1563406831
        assert_eq!(floor_to_bucket(1_563_406_831, 3_600), 1_563_404_400);
        // Already on the boundary
        assert_eq!(floor_to_bucket(1_563_404_400, 3_600), 1_563_404_400);
    }

    #[test]
    fn test_floor_to_bucket_minute() {
        assert_eq!(floor_to_bucket(1_563_406_831, 60), 1_563_406_800);
    }

    #[test]
    fn test_floor_to_bucket_day() {
        let day = floor_to_bucket(1_563_406_831, 86_400);
        assert_eq!(day % 86_400, 0);
        assert!(day <= 1_563_406_831);
    }

    #[test]
    fn test_parse_apache_timestamp() {
        let ts = parse_apache_timestamp("17/Jul/2019:23:40:31").unwrap();
        assert_eq!(ts.year(), 2019);
        assert_eq!(ts.month(), 7);
        assert_eq!(ts.day(), 17);
        assert_eq!(ts.hour(), 23);
        assert_eq!(ts.minute(), 40);
        assert_eq!(ts.second(), 31);
    }

    #[test]
    fn test_parse_apache_timestamp_invalid() {
        assert!(parse_apache_timestamp("32/Jul/2019:23:40:31").is_none());
        assert!(parse_apache_timestamp("17/July/2019:23:40:31").is_none());
        assert!(parse_apache_timestamp("").is_none());
    }

    #[test]
    fn test_timestamp_round_trip() {
        let raw = "01/Jan/2024:00:00:00";
        let parsed = parse_apache_timestamp(raw).unwrap();
        assert_eq!(format_apache_timestamp(&parsed), raw);
    }
}
