use crate::model::{CalendarEvent, Span};

/// Ad-hoc free/busy decision for one requested interval, without building a
/// table. Single pass over a list sorted by `(start, name)`:
/// once an event starts at or after the requested end, no later event can
/// conflict either, so the scan short-circuits.
pub fn is_available(sorted_events: &[CalendarEvent], requested: &Span) -> bool {
    for ev in sorted_events {
        if requested.end <= ev.start {
            return true;
        }
        if requested.overlaps(&ev.span()) {
            return false;
        }
    }
    true
}
