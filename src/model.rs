use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use chrono_tz::Tz;
use serde::Serialize;

/// An instant in the reference timezone — the only time type queries see.
pub type Zoned = DateTime<Tz>;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Zoned,
    pub end: Zoned,
}

impl Span {
    pub fn new(start: Zoned, end: Zoned) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Zoned) -> bool {
        self.start <= t && t < self.end
    }
}

/// One parsed calendar entry. Immutable once loaded; the engine only reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub name: String,
    pub start: Zoned,
    pub end: Zoned,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl CalendarEvent {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// Schedulable portion of each day: `[open_hour:00, close_hour:00)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub open_hour: u32,
    pub close_hour: u32,
}

impl BusinessHours {
    pub fn new(open_hour: u32, close_hour: u32) -> Self {
        debug_assert!(open_hour < close_hour && close_hour <= 23);
        Self { open_hour, close_hour }
    }

    pub fn contains(&self, t: &Zoned) -> bool {
        t.hour() >= self.open_hour && t.hour() < self.close_hour
    }

    /// The business-day open on the given date, in the date's timezone.
    pub fn open_on(&self, date: NaiveDate, tz: Tz) -> Option<Zoned> {
        local_instant(date, self.open_hour, 0, tz)
    }

    /// The business-day close on the given date. `None` only for degenerate
    /// local times that do not exist in the zone.
    pub fn close_on(&self, date: NaiveDate, tz: Tz) -> Option<Zoned> {
        local_instant(date, self.close_hour, 0, tz)
    }
}

/// Preprocessing window the availability table is materialized over,
/// inclusive of both endpoints, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Zoned,
    pub end: Zoned,
}

impl Window {
    pub fn new(start: Zoned, end: Zoned) -> Self {
        let start = truncate_to_minute(start);
        let end = truncate_to_minute(end);
        debug_assert!(start <= end, "Window start must not be after end");
        Self { start, end }
    }

    pub fn total_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Minute offset of `t` into the window, or `None` when `t` falls outside.
    pub fn minute_offset(&self, t: Zoned) -> Option<usize> {
        let t = truncate_to_minute(t);
        if t < self.start || t > self.end {
            return None;
        }
        Some((t - self.start).num_minutes() as usize)
    }
}

pub fn truncate_to_minute(t: Zoned) -> Zoned {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

fn local_instant(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> Option<Zoned> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&naive).earliest()
}

/// Parse a request instant: RFC 3339 with offset, or a naive local
/// datetime (`2024-12-02T12:30` / `2024-12-02T12:30:00`) in the reference zone.
pub fn parse_instant(s: &str, tz: Tz) -> Option<Zoned> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&tz));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()?;
    tz.from_local_datetime(&naive).earliest()
}

/// Next quarter-hour boundary strictly after `t`; only minute 0 stays put
/// (1-14 → 15, 15-29 → 30, 30-44 → 45, 45-59 → next hour).
pub fn round_up_to_quarter(t: Zoned) -> Zoned {
    let t = truncate_to_minute(t);
    if t.minute() == 0 {
        return t;
    }
    let rem = t.minute() % 15;
    let step = if rem == 0 { 15 } else { 15 - rem };
    t + Duration::minutes(step as i64)
}

/// Quarter-hour candidate instants from `start` (rounded up) through `end`, inclusive.
pub fn quarter_hours(start: Zoned, end: Zoned) -> QuarterHours {
    QuarterHours {
        next: round_up_to_quarter(start),
        end: truncate_to_minute(end),
    }
}

pub struct QuarterHours {
    next: Zoned,
    end: Zoned,
}

impl Iterator for QuarterHours {
    type Item = Zoned;

    fn next(&mut self) -> Option<Zoned> {
        if self.next > self.end {
            return None;
        }
        let t = self.next;
        self.next = t + Duration::minutes(15);
        Some(t)
    }
}
