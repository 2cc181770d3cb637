use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

/// Read-time expiry of stored results.
///
/// Stale results are only ever hidden from readers, the backing
/// store remains responsible for actually removing them.
#[derive(Debug, Copy, Clone)]
pub struct FreshnessPolicy {
    ttl_seconds: i64,
}

impl FreshnessPolicy {
    pub fn new(ttl_seconds: i64) -> Self {
        Self { ttl_seconds }
    }

    #[inline]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    #[inline]
    pub fn is_expired(&self, last_modified: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        is_expired(last_modified, self.ttl_seconds, now)
    }
}

/// Returns `true` if more than `ttl_seconds` have passed between
/// `last_modified` and `now`.
///
/// A TTL of zero or less disables expiry entirely.
pub fn is_expired(last_modified: DateTime<Utc>, ttl_seconds: i64, now: DateTime<Utc>) -> bool {
    if ttl_seconds <= 0 {
        return false;
    }

    // `Duration` holds at most `i64::MAX` milliseconds.
    let ttl = Duration::seconds(ttl_seconds.min(i64::MAX / 1000));

    (now - last_modified) > ttl
}

/// Timestamps without any timezone information are treated as UTC.
#[inline]
pub fn assume_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&naive)
}

/// Parses a `Last-Modified` style header value.
///
/// Accepts RFC 2822 / HTTP-dates (`Wed, 21 Oct 2015 07:28:00 GMT`) and
/// RFC 3339, falling back to a bare `%Y-%m-%dT%H:%M:%S` which is assumed
/// to be UTC.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(assume_utc)
}

/// Formats a timestamp as an HTTP-date for response headers.
pub fn format_http_date(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
