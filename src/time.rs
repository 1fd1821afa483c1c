use ::time::PrimitiveDateTime;
use ::time::format_description::BorrowedFormatItem;
use ::time::macros::format_description;
use std::time::Duration;

pub fn parse_duration(s: &str) -> Result<Duration, String> {
    cyborgtime::parse_duration(s).map_err(|e| format!("Invalid duration: {e}"))
}

/// The ASA renders timestamps as `HH:MM:SS <zone> <Mon> <day> <year>`, both in the
/// monitoring clock response and in the `validityEndDate` field of certificate
/// details. The zone token is dropped before parsing: every comparison we make is
/// between two device-local timestamps, so the zone cancels out.
const DEVICE_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] = format_description!(
    "[hour padding:none]:[minute]:[second] [month repr:short] [day padding:none] [year]"
);

pub fn parse_device_timestamp(raw: &str) -> Result<PrimitiveDateTime, String> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let normalized = match tokens.as_slice() {
        [time, _zone, month, day, year] => format!("{time} {month} {day} {year}"),
        [time, month, day, year] => format!("{time} {month} {day} {year}"),
        _ => return Err(format!("unrecognized device timestamp: {raw:?}")),
    };
    PrimitiveDateTime::parse(&normalized, DEVICE_TIMESTAMP_FORMAT)
        .map_err(|e| format!("unparseable device timestamp {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use crate::time::{parse_device_timestamp, parse_duration};
    use ::time::macros::datetime;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case("12:17:00 UTC Aug 6 2026", datetime!(2026-08-06 12:17:00))]
    #[case("23:59:59 EST Dec 31 1999", datetime!(1999-12-31 23:59:59))]
    #[case("09:05:01 UTC Jan 15 2024", datetime!(2024-01-15 09:05:01))]
    #[case("6:00:00 CEST Sep 3 2025", datetime!(2025-09-03 06:00:00))]
    fn test_parse_device_timestamp(
        #[case] raw: &str,
        #[case] expected: ::time::PrimitiveDateTime,
    ) {
        let parsed = parse_device_timestamp(raw).unwrap();
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("12:17 UTC Aug 6 2026")]
    #[case("12:17:00 UTC Octember 6 2026")]
    fn test_parse_device_timestamp_rejects_garbage(#[case] raw: &str) {
        assert!(parse_device_timestamp(raw).is_err());
    }

    #[rstest]
    #[case("30s", Duration::from_secs(30))]
    #[case("2m", Duration::from_secs(120))]
    #[case("1h 30m", Duration::from_secs(5400))]
    fn test_parse_duration(#[case] raw: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(raw).unwrap(), expected);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("not a duration").is_err());
    }
}
