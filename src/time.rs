//! Time related utils.

use chrono::Utc;

/// DateTime is the alias of `chrono::DateTime<Utc>`.
pub type DateTime = chrono::DateTime<Utc>;

/// Return the current UTC time.
pub fn now() -> DateTime {
    Utc::now()
}

/// Format a datetime into the AMZ short date: `20220313`.
///
/// Used in the credential scope and the signing key derivation chain.
pub fn format_date(t: DateTime) -> String {
    t.format("%Y%m%d").to_string()
}

/// Format a datetime into the AMZ long date: `20220313T072004Z`.
///
/// This is ISO 8601 basic format without separators or milliseconds.
pub fn format_iso8601(t: DateTime) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn test_time() -> DateTime {
        Utc.with_ymd_and_hms(2022, 3, 1, 8, 12, 34).unwrap()
    }

    #[test]
    fn test_format_date() {
        assert_eq!("20220301", format_date(test_time()));
    }

    #[test]
    fn test_format_iso8601() {
        assert_eq!("20220301T081234Z", format_iso8601(test_time()));
    }
}
