//! HTTP timestamps.
//!
//! Dates are written as RFC 1123 in GMT. Parsing is lenient: it accepts
//! `weekday, day month year HH:MM:SS zone`, optionally preceded by a stray
//! `Date:` token, and treats the zone label as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::SystemTime;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a timestamp for a `Date:` or `If-modified-since:` header.
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// Format a filesystem timestamp.
pub fn format_system_time(at: SystemTime) -> String {
    format_http_date(DateTime::<Utc>::from(at))
}

/// Current time as an HTTP date.
pub fn now() -> String {
    format_http_date(Utc::now())
}

/// Parse an `If-modified-since` style value.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let mut tokens: Vec<&str> = value.split_whitespace().collect();
    if tokens.first().is_some_and(|t| t.eq_ignore_ascii_case("date:")) {
        tokens.remove(0);
    }
    if tokens.first().is_some_and(|t| t.ends_with(',')) {
        tokens.remove(0);
    }
    if tokens.len() < 4 {
        return None;
    }

    let joined = format!("{} {} {} {}", tokens[0], tokens[1], tokens[2], tokens[3]);
    NaiveDateTime::parse_from_str(&joined, "%d %b %Y %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
