//! Publish-date normalization.
//!
//! Feeds put almost anything in `pubDate`. Dates are tried against a fixed,
//! ordered list of layouts and the first one that parses wins; text that
//! matches none of them yields `None` so the entry can still be stored.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};

/// How the leading weekday is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WeekdayStyle {
    /// No weekday.
    None,
    /// `Mon`
    Short,
    /// `Mon,`
    ShortComma,
    /// `Monday,`
    LongComma,
}

/// How the zone is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneStyle {
    /// No zone; the time is UTC.
    Utc,
    /// Numeric offset (`-0700`), handled by `%z` in the format.
    Numeric,
    /// Alphabetic abbreviation (`MST`) at the given token position from the end.
    Abbreviation { from_end: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutKind {
    Rfc3339 {
        fractional: bool,
    },
    Pattern {
        weekday: WeekdayStyle,
        /// chrono format for everything after the weekday
        format: &'static str,
        zone: ZoneStyle,
    },
}

/// A named date layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateLayout {
    /// Layout name.
    pub name: &'static str,
    kind: LayoutKind,
}

/// Supported layouts, in the order they are tried.
pub const DATE_LAYOUTS: [DateLayout; 10] = [
    DateLayout {
        name: "RFC1123",
        kind: LayoutKind::Pattern {
            weekday: WeekdayStyle::ShortComma,
            format: "%d %b %Y %H:%M:%S %z",
            zone: ZoneStyle::Abbreviation { from_end: 0 },
        },
    },
    DateLayout {
        name: "RFC1123Z",
        kind: LayoutKind::Pattern {
            weekday: WeekdayStyle::ShortComma,
            format: "%d %b %Y %H:%M:%S %z",
            zone: ZoneStyle::Numeric,
        },
    },
    DateLayout {
        name: "RFC822",
        kind: LayoutKind::Pattern {
            weekday: WeekdayStyle::None,
            format: "%d %b %y %H:%M %z",
            zone: ZoneStyle::Abbreviation { from_end: 0 },
        },
    },
    DateLayout {
        name: "RFC822Z",
        kind: LayoutKind::Pattern {
            weekday: WeekdayStyle::None,
            format: "%d %b %y %H:%M %z",
            zone: ZoneStyle::Numeric,
        },
    },
    DateLayout {
        name: "RFC850",
        kind: LayoutKind::Pattern {
            weekday: WeekdayStyle::LongComma,
            format: "%d-%b-%y %H:%M:%S %z",
            zone: ZoneStyle::Abbreviation { from_end: 0 },
        },
    },
    DateLayout {
        name: "RFC3339",
        kind: LayoutKind::Rfc3339 { fractional: false },
    },
    DateLayout {
        name: "RFC3339Nano",
        kind: LayoutKind::Rfc3339 { fractional: true },
    },
    DateLayout {
        name: "ANSIC",
        kind: LayoutKind::Pattern {
            weekday: WeekdayStyle::Short,
            format: "%b %e %H:%M:%S %Y",
            zone: ZoneStyle::Utc,
        },
    },
    DateLayout {
        name: "UnixDate",
        kind: LayoutKind::Pattern {
            weekday: WeekdayStyle::Short,
            format: "%b %e %H:%M:%S %z %Y",
            zone: ZoneStyle::Abbreviation { from_end: 1 },
        },
    },
    DateLayout {
        name: "RubyDate",
        kind: LayoutKind::Pattern {
            weekday: WeekdayStyle::Short,
            format: "%b %d %H:%M:%S %z %Y",
            zone: ZoneStyle::Numeric,
        },
    },
];

const SHORT_WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const LONG_WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// RFC 822 zone abbreviations, offsets in seconds east of UTC.
const ZONE_ABBREVIATIONS: [(&str, i32); 12] = [
    ("UT", 0),
    ("UTC", 0),
    ("GMT", 0),
    ("Z", 0),
    ("EST", -5 * 3600),
    ("EDT", -4 * 3600),
    ("CST", -6 * 3600),
    ("CDT", -5 * 3600),
    ("MST", -7 * 3600),
    ("MDT", -6 * 3600),
    ("PST", -8 * 3600),
    ("PDT", -7 * 3600),
];

/// Normalize a feed-supplied publish date.
pub fn normalize(raw: &str) -> Option<DateTime<FixedOffset>> {
    normalize_with_layout(raw).map(|(_, dt)| dt)
}

/// Normalize a publish date, also returning the name of the layout that matched.
pub fn normalize_with_layout(raw: &str) -> Option<(&'static str, DateTime<FixedOffset>)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(raw).map(|dt| (layout.name, dt)))
}

impl DateLayout {
    /// Parse `raw` with this layout alone.
    pub fn parse(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        match self.kind {
            LayoutKind::Rfc3339 { fractional } => parse_rfc3339(raw, fractional),
            LayoutKind::Pattern {
                weekday,
                format,
                zone,
            } => parse_pattern(raw, weekday, format, zone),
        }
    }
}

fn parse_rfc3339(raw: &str, fractional: bool) -> Option<DateTime<FixedOffset>> {
    // Seconds are followed by '.' only when a fraction is present
    if !fractional && raw.contains('.') {
        return None;
    }
    DateTime::parse_from_rfc3339(raw).ok()
}

fn parse_pattern(
    raw: &str,
    weekday: WeekdayStyle,
    format: &str,
    zone: ZoneStyle,
) -> Option<DateTime<FixedOffset>> {
    let mut tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();

    if weekday != WeekdayStyle::None {
        let first = tokens.first()?;
        if !is_weekday(first, weekday) {
            return None;
        }
        tokens.remove(0);
    }

    match zone {
        ZoneStyle::Utc => {
            let naive = NaiveDateTime::parse_from_str(&tokens.join(" "), format).ok()?;
            let utc = FixedOffset::east_opt(0)?;
            Some(utc.from_utc_datetime(&naive))
        }
        ZoneStyle::Numeric => DateTime::parse_from_str(&tokens.join(" "), format).ok(),
        ZoneStyle::Abbreviation { from_end } => {
            let idx = tokens.len().checked_sub(from_end + 1)?;
            let offset = zone_offset(&tokens[idx])?;
            tokens[idx] = format_offset(offset);
            DateTime::parse_from_str(&tokens.join(" "), format).ok()
        }
    }
}

/// The weekday is validated but otherwise ignored.
fn is_weekday(token: &str, style: WeekdayStyle) -> bool {
    match style {
        WeekdayStyle::None => true,
        WeekdayStyle::Short => SHORT_WEEKDAYS.iter().any(|d| d.eq_ignore_ascii_case(token)),
        WeekdayStyle::ShortComma => token
            .strip_suffix(',')
            .is_some_and(|t| SHORT_WEEKDAYS.iter().any(|d| d.eq_ignore_ascii_case(t))),
        WeekdayStyle::LongComma => token
            .strip_suffix(',')
            .is_some_and(|t| LONG_WEEKDAYS.iter().any(|d| d.eq_ignore_ascii_case(t))),
    }
}

/// Offset in seconds for a zone abbreviation.
///
/// Unlisted abbreviations of 3-5 uppercase letters are accepted with a zero
/// offset; anything else (including numeric offsets) is rejected.
fn zone_offset(token: &str) -> Option<i32> {
    if let Some(&(_, offset)) = ZONE_ABBREVIATIONS.iter().find(|(name, _)| *name == token) {
        return Some(offset);
    }
    let is_abbreviation =
        (3..=5).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_uppercase());
    is_abbreviation.then_some(0)
}

fn format_offset(offset: i32) -> String {
    let sign = if offset < 0 { '-' } else { '+' };
    let abs = offset.abs();
    format!("{}{:02}{:02}", sign, abs / 3600, (abs % 3600) / 60)
}
