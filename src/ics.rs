//! Minimal iCalendar (RFC 5545) reader: just enough of the format to pull
//! `VEVENT` components out of the static calendar files this service is
//! pointed at. Recurrence rules are out of scope and ignored.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::engine::EngineError;
use crate::model::{CalendarEvent, Zoned};

/// Parse every `VEVENT` in `text`, normalizing all instants into `tz`.
/// Events come back in file order; sorting is the event source's job.
pub fn parse_events(text: &str, tz: Tz) -> Result<Vec<CalendarEvent>, EngineError> {
    let mut events = Vec::new();
    let mut current: Option<VEventBuilder> = None;

    for line in unfold_lines(text) {
        let Some((prop, value)) = split_content_line(&line) else {
            continue;
        };
        match prop.name.as_str() {
            "BEGIN" if value.eq_ignore_ascii_case("VEVENT") => {
                current = Some(VEventBuilder::default());
            }
            "END" if value.eq_ignore_ascii_case("VEVENT") => {
                if let Some(builder) = current.take() {
                    events.push(builder.finish()?);
                }
            }
            name => {
                let Some(ev) = current.as_mut() else { continue };
                match name {
                    "SUMMARY" => ev.summary = Some(unescape_text(value)),
                    "DESCRIPTION" => ev.description = Some(unescape_text(value)),
                    "LOCATION" => ev.location = Some(unescape_text(value)),
                    "DTSTART" => ev.start = Some(parse_datetime(value, &prop.tzid, tz)?),
                    "DTEND" => ev.end = Some(parse_datetime(value, &prop.tzid, tz)?),
                    _ => {}
                }
            }
        }
    }

    if current.is_some() {
        return Err(EngineError::DataFault(
            "unterminated VEVENT component".into(),
        ));
    }
    Ok(events)
}

#[derive(Default)]
struct VEventBuilder {
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<Zoned>,
    end: Option<Zoned>,
}

impl VEventBuilder {
    fn finish(self) -> Result<CalendarEvent, EngineError> {
        let name = self.summary.unwrap_or_default();
        let start = self
            .start
            .ok_or_else(|| EngineError::DataFault(format!("event '{name}' missing DTSTART")))?;
        let end = self
            .end
            .ok_or_else(|| EngineError::DataFault(format!("event '{name}' missing DTEND")))?;
        Ok(CalendarEvent {
            name,
            start,
            end,
            description: self.description,
            location: self.location,
        })
    }
}

struct PropName {
    name: String,
    /// `TZID=` parameter, when present on DTSTART/DTEND.
    tzid: Option<String>,
}

/// Split `NAME;PARAM=V;PARAM=V:value` into the property head and its value.
fn split_content_line(line: &str) -> Option<(PropName, &str)> {
    let colon = line.find(':')?;
    let (head, value) = (&line[..colon], &line[colon + 1..]);
    let mut parts = head.split(';');
    let name = parts.next()?.trim().to_ascii_uppercase();
    let tzid = parts
        .find_map(|p| p.strip_prefix("TZID="))
        .map(|s| s.trim().to_string());
    Some((PropName { name, tzid }, value))
}

/// Undo RFC 5545 line folding: a line starting with space or tab continues
/// the previous one.
fn unfold_lines(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in text.lines() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(cont) = line.strip_prefix(' ').or_else(|| line.strip_prefix('\t')) {
            if let Some(last) = out.last_mut() {
                last.push_str(cont);
                continue;
            }
        }
        out.push(line.to_string());
    }
    out
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(escaped) => out.push(escaped),
            None => out.push('\\'),
        }
    }
    out
}

/// Accepted forms: `YYYYMMDDTHHMMSSZ` (UTC), `YYYYMMDDTHHMMSS` with or
/// without a `TZID=` parameter (no param means the reference zone), and
/// bare `YYYYMMDD` (local midnight, all-day start).
fn parse_datetime(value: &str, tzid: &Option<String>, reference: Tz) -> Result<Zoned, EngineError> {
    let value = value.trim();

    if let Some(utc_part) = value.strip_suffix('Z') {
        let naive = parse_naive(utc_part)?;
        return Ok(Utc.from_utc_datetime(&naive).with_timezone(&reference));
    }

    let zone = match tzid {
        Some(id) => Tz::from_str(id)
            .map_err(|_| EngineError::DataFault(format!("unknown TZID '{id}'")))?,
        None => reference,
    };
    let naive = parse_naive(value)?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&reference))
        .ok_or_else(|| EngineError::DataFault(format!("nonexistent local time '{value}'")))
}

fn parse_naive(value: &str) -> Result<NaiveDateTime, EngineError> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(EngineError::DataFault(format!(
        "unparseable datetime '{value}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TZ: Tz = chrono_tz::America::Los_Angeles;

    fn la(day: u32, h: u32, m: u32) -> Zoned {
        TZ.with_ymd_and_hms(2024, 12, day, h, m, 0).unwrap()
    }

    #[test]
    fn parses_utc_event() {
        let text = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nSUMMARY:Lunch\r\nDTSTART:20241202T200000Z\r\nDTEND:20241202T210000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let events = parse_events(text, TZ).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Lunch");
        // 20:00 UTC is noon Pacific in December
        assert_eq!(events[0].start, la(2, 12, 0));
        assert_eq!(events[0].end, la(2, 13, 0));
    }

    #[test]
    fn parses_tzid_and_floating_forms() {
        let text = "BEGIN:VEVENT\nSUMMARY:A\nDTSTART;TZID=America/New_York:20241202T150000\nDTEND:20241202T130000\nEND:VEVENT\n";
        let events = parse_events(text, TZ).unwrap();
        // 15:00 Eastern == 12:00 Pacific; floating DTEND read in the reference zone
        assert_eq!(events[0].start, la(2, 12, 0));
        assert_eq!(events[0].end, la(2, 13, 0));
    }

    #[test]
    fn unfolds_continuation_lines() {
        let text = "BEGIN:VEVENT\nSUMMARY:Quarterly\n  planning\nDTSTART:20241203T170000Z\nDTEND:20241203T180000Z\nEND:VEVENT\n";
        let events = parse_events(text, TZ).unwrap();
        assert_eq!(events[0].name, "Quarterly planning");
    }

    #[test]
    fn unescapes_text_values() {
        let text = "BEGIN:VEVENT\nSUMMARY:One\\, two\\; three\nDESCRIPTION:line\\nbreak\nDTSTART:20241203T170000Z\nDTEND:20241203T180000Z\nEND:VEVENT\n";
        let events = parse_events(text, TZ).unwrap();
        assert_eq!(events[0].name, "One, two; three");
        assert_eq!(events[0].description.as_deref(), Some("line\nbreak"));
    }

    #[test]
    fn date_only_is_local_midnight() {
        let text = "BEGIN:VEVENT\nSUMMARY:Allday\nDTSTART:20241204\nDTEND:20241205\nEND:VEVENT\n";
        let events = parse_events(text, TZ).unwrap();
        assert_eq!(events[0].start, la(4, 0, 0));
        assert_eq!(events[0].end, la(5, 0, 0));
    }

    #[test]
    fn missing_dtend_is_a_fault() {
        let text = "BEGIN:VEVENT\nSUMMARY:Broken\nDTSTART:20241204T100000Z\nEND:VEVENT\n";
        assert!(matches!(
            parse_events(text, TZ),
            Err(EngineError::DataFault(_))
        ));
    }

    #[test]
    fn unknown_tzid_is_a_fault() {
        let text = "BEGIN:VEVENT\nDTSTART;TZID=Mars/Olympus:20241204T100000\nDTEND:20241204T110000Z\nEND:VEVENT\n";
        assert!(matches!(
            parse_events(text, TZ),
            Err(EngineError::DataFault(_))
        ));
    }

    #[test]
    fn non_event_components_are_skipped() {
        let text = "BEGIN:VTODO\nSUMMARY:Chore\nEND:VTODO\n";
        let events = parse_events(text, TZ).unwrap();
        assert!(events.is_empty());
    }
}
