//! UTC epoch-second arithmetic and the two textual time formats this
//! crate has to deal with:
//!
//! - HTTP-date, on the wire (`Expires`, `Last-Modified`, `If-Modified-Since`),
//!   parsed tolerantly of both `GMT` and `UTC` end tokens.
//! - The `"%a, %b %e %H:%M:%S %Y GMT"` rendering used in log lines.
//!
//! All arithmetic happens in epoch seconds so that freshness comparisons
//! never depend on the host's local time zone.

use std::time::{SystemTime, UNIX_EPOCH};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const LOG_DATE_FORMAT: &[FormatItem<'_>] = format_description!(
    "[weekday repr:short], [month repr:short] [day padding:space] [hour repr:24]:[minute]:[second] [year] GMT"
);

/// Current time as UTC epoch seconds.
pub fn now_utc() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_secs() as i64
}

/// Renders an epoch-second timestamp the way log lines spell dates:
/// `Wed, Jun  9 10:18:14 2021 GMT`.
pub fn format_gmt(epoch: i64) -> String {
    let dt = OffsetDateTime::from_unix_timestamp(epoch)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    dt.format(LOG_DATE_FORMAT).unwrap_or_else(|_| epoch.to_string())
}

/// Parses an HTTP-date header value into UTC epoch seconds.
///
/// Accepts the three formats `httpdate` understands (RFC 1123, RFC 850,
/// asctime) and additionally tolerates a trailing `UTC` token where the
/// spec calls for `GMT`, since some origins emit `UTC` in violation of
/// RFC 7231.
pub fn parse_http_date(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(st) = httpdate::parse_http_date(trimmed) {
        return epoch_of(st);
    }
    if let Some(prefix) = trimmed.strip_suffix("UTC") {
        let resubmitted = format!("{}GMT", prefix);
        if let Ok(st) = httpdate::parse_http_date(&resubmitted) {
            return epoch_of(st);
        }
    }
    None
}

fn epoch_of(st: SystemTime) -> Option<i64> {
    st.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc1123_gmt() {
        let epoch = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(epoch, 784111777);
    }

    #[test]
    fn parses_rfc1123_utc_tolerantly() {
        let gmt = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        let utc = parse_http_date("Sun, 06 Nov 1994 08:49:37 UTC").unwrap();
        assert_eq!(gmt, utc);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_http_date("not a date").is_none());
    }

    #[test]
    fn formats_round_trip_shape() {
        let rendered = format_gmt(784111777);
        assert!(rendered.ends_with("GMT"));
        assert!(rendered.starts_with("Sun,"));
    }
}
