//! Header handling for the default parser: unfolding, read-state flags,
//! envelope lines and date parsing.
//!
//! Header values are kept as raw text. Encoded words and charsets are left
//! alone.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

use crate::model::mail::{Envelope, MessageStatus};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Zone names that `Date:` headers carry instead of a numeric offset.
const ZONES: &[(&str, &str)] = &[
    ("UT", "+0000"),
    ("UTC", "+0000"),
    ("GMT", "+0000"),
    ("Z", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("EET", "+0200"),
    ("EEST", "+0300"),
    ("JST", "+0900"),
];

/// Layouts tried once the weekday is gone.
/// Layouts without an offset are read as UTC.
const LENIENT_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Split a header block into `(lowercase_name, value)` pairs, joining
/// continuation lines onto the header they continue.
///
/// Lines that are neither a header nor a continuation are dropped.
pub fn unfold_headers(block: &[u8]) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for raw in block.split(|&b| b == b'\n') {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');

        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    headers
}

/// First value of header `name`, compared case-insensitively.
pub fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v.as_str()))
}

/// Read-state flags from `Status:` (`R`, `O`) and `X-Status:` (`A`, `F`, `D`).
pub fn parse_status(headers: &[(String, String)]) -> MessageStatus {
    let status = get_header(headers, "status").unwrap_or_default();
    let x_status = get_header(headers, "x-status").unwrap_or_default();
    MessageStatus {
        read: status.contains('R'),
        old: status.contains('O'),
        answered: x_status.contains('A'),
        flagged: x_status.contains('F'),
        deleted: x_status.contains('D'),
    }
}

/// Split an envelope line (`From sender Mon Jan  1 00:00:00 2024`) into the
/// sender token and the delivery date.
///
/// Lenient: a line that does not follow the usual layout yields whatever
/// could be recognized, never an error.
pub fn parse_envelope(line: &str) -> Envelope {
    let line = line.trim_start_matches('\u{feff}');
    let rest = line.strip_prefix("From ").unwrap_or(line).trim();
    let (sender, date_part) = match rest.split_once(char::is_whitespace) {
        Some((sender, tail)) => (sender, tail.trim()),
        None => (rest, ""),
    };

    // "Mon,Jan 15 ..." and "Mon Jan  1 ..." both become "Mon Jan 1 ..."
    // Trailing extras (timezone, "remote from host") are dropped.
    let tokens: Vec<&str> = date_part
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .take(5)
        .collect();
    let date = NaiveDateTime::parse_from_str(&tokens.join(" "), "%a %b %d %H:%M:%S %Y")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt));

    Envelope {
        sender: sender.to_string(),
        date,
    }
}

/// Parse a `Date:` header value into UTC.
///
/// Zone names become offsets first. Then RFC 2822 and RFC 3339 are tried,
/// then [`LENIENT_FORMATS`] after dropping the weekday and expanding
/// IMAP-style `16-JUL-2025` days. `mail-parser` gets the last word.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    // RFC 2822 parsing reads unknown zone names as +0000.
    let zoned = numeric_zone(value);
    let candidate = zoned.as_deref().unwrap_or(value);

    let parsed = DateTime::parse_from_rfc2822(candidate)
        .or_else(|_| DateTime::parse_from_rfc3339(candidate))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| lenient_date(candidate))
        .or_else(|| mail_parser_date(value));

    if parsed.is_none() {
        warn!(date = value, "Unparseable date header");
    }
    parsed
}

fn lenient_date(value: &str) -> Option<DateTime<Utc>> {
    let bare = without_weekday(value);
    let expanded = expand_imap_day(bare);
    let candidate = expanded.as_deref().unwrap_or(bare);

    LENIENT_FORMATS.iter().find_map(|fmt| {
        DateTime::parse_from_str(candidate, fmt)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| NaiveDateTime::parse_from_str(candidate, fmt).map(|n| n.and_utc()))
            .ok()
    })
}

fn mail_parser_date(value: &str) -> Option<DateTime<Utc>> {
    let header = format!("Date: {value}\n\n");
    let message = mail_parser::MessageParser::default().parse(header.as_bytes())?;
    let rfc3339 = message.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&rfc3339)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `"Thu, 04 Jan"` and `"Thu 04 Jan"` become `"04 Jan"`.
fn without_weekday(value: &str) -> &str {
    match value.split_once([',', ' ']) {
        Some((head, rest)) if WEEKDAYS.iter().any(|d| d.eq_ignore_ascii_case(head)) => {
            rest.trim_start_matches([',', ' '])
        }
        _ => value,
    }
}

/// `"16-JUL-2025 03:01:03"` becomes `"16 Jul 2025 03:01:03"`.
fn expand_imap_day(value: &str) -> Option<String> {
    let (day_part, rest) = value.split_once(' ').unwrap_or((value, ""));
    let mut parts = day_part.split('-');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let month = MONTHS.iter().find(|m| m.eq_ignore_ascii_case(month))?;
    Some(format!("{day} {month} {year} {rest}").trim_end().to_string())
}

/// Replace a trailing zone name with its numeric offset.
fn numeric_zone(value: &str) -> Option<String> {
    let (head, zone) = value.rsplit_once(' ')?;
    let (_, offset) = ZONES.iter().find(|(name, _)| name.eq_ignore_ascii_case(zone))?;
    Some(format!("{head} {offset}"))
}
