//! Small display helpers for console rows.

use std::fmt::Display;

use chrono::{Local, TimeZone};

use crate::events::{EventEntry, EventKind};
use crate::rows::{summarize, truncate_chars};
use crate::stringify::stringify;

pub const DEFAULT_SNIPPET_LEN: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Palette {
    Red,
    Green,
    Accent,
}

/// Colour tokens for a row of the given kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindMeta {
    pub palette: Palette,
    pub border: &'static str,
}

pub fn kind_meta(kind: EventKind) -> KindMeta {
    match kind {
        EventKind::Error => KindMeta {
            palette: Palette::Red,
            border: "red.500",
        },
        EventKind::Done => KindMeta {
            palette: Palette::Green,
            border: "green.500",
        },
        EventKind::Message => KindMeta {
            palette: Palette::Accent,
            border: "accent",
        },
    }
}

/// Local wall-clock time (`HH:MM:SS`) of a millisecond timestamp.
pub fn fmt_time(t: f64) -> String {
    fmt_time_in(t, &Local)
}

pub fn fmt_time_in<Tz>(t: f64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    tz.timestamp_millis_opt(t as i64)
        .single()
        .map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Collapses whitespace runs to single spaces and cuts to `max` characters.
pub fn inline_snippet(text: &str, max: usize) -> String {
    let one_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&one_line, max)
}

/// Text placed on the clipboard for a row: the full payload when it renders
/// to something, otherwise the row summary.
pub fn copy_text(event: &EventEntry) -> String {
    event
        .payload
        .as_ref()
        .map(stringify)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| summarize(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Payload;
    use chrono::Utc;

    #[test]
    fn kinds_map_to_palettes() {
        assert_eq!(kind_meta(EventKind::Error).palette, Palette::Red);
        assert_eq!(kind_meta(EventKind::Done).border, "green.500");
        assert_eq!(kind_meta(EventKind::Message).palette, Palette::Accent);
    }

    #[test]
    fn time_is_hours_minutes_seconds() {
        // 2024-01-02T03:04:05.678Z
        assert_eq!(fmt_time_in(1_704_164_645_678.0, &Utc), "03:04:05");
        assert_eq!(fmt_time(0.0).len(), 8);
    }

    #[test]
    fn snippet_collapses_whitespace() {
        assert_eq!(inline_snippet("  a\n\tb   c ", 10), "a b c");
        assert_eq!(inline_snippet("abcdef", 3), "abc…");
    }

    #[test]
    fn copy_prefers_full_payload() {
        let event = EventEntry::message(1.0, Payload::object([("a", 1)]));
        assert_eq!(copy_text(&event), "{\n  \"a\": 1\n}");

        let done = EventEntry::done(1.0, Payload::object([("stage", "run")]));
        assert!(copy_text(&done).contains("\"stage\": \"run\""));

        let empty = EventEntry::new(1.0, EventKind::Error, None);
        assert_eq!(copy_text(&empty), "error occurred");
    }
}
