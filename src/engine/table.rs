use std::collections::HashMap;

use chrono::Duration;

use crate::model::*;

use super::EngineError;

// ── Availability Table ────────────────────────────────────────────

/// Materialized free/busy lookup for a fixed preprocessing window.
///
/// Per agent, a flat vector of free-minutes indexed by minutes since
/// `window.start` (one slot per minute, both window endpoints included).
/// A stored value is the number of minutes from that instant to the next
/// conflicting event or the business-day close, whichever comes first;
/// 0 means unavailable. An immutable snapshot: rebuilding from the same
/// event lists yields an identical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityTable {
    window: Window,
    agents: HashMap<String, Vec<u16>>,
}

impl AvailabilityTable {
    /// Materialize the window for every agent in `event_lists`. Each list
    /// must already be sorted by `(start, name)`.
    pub fn build(
        event_lists: &HashMap<String, Vec<CalendarEvent>>,
        window: Window,
        hours: BusinessHours,
    ) -> Result<AvailabilityTable, EngineError> {
        let mut agents = HashMap::with_capacity(event_lists.len());
        for (agent, events) in event_lists {
            agents.insert(agent.clone(), build_agent_slots(events, window, hours)?);
        }
        Ok(AvailabilityTable { window, agents })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Free minutes at `t` (truncated to the minute) for `agent`.
    /// A miss is a window/roster mismatch, not a business condition.
    pub fn free_minutes(&self, agent: &str, t: Zoned) -> Result<u16, EngineError> {
        let slots = self
            .agents
            .get(agent)
            .ok_or_else(|| EngineError::NotFound(format!("agent {agent} not in table")))?;
        let offset = self.window.minute_offset(t).ok_or_else(|| {
            EngineError::NotFound(format!("{t} outside preprocessing window"))
        })?;
        Ok(slots[offset])
    }
}

/// Forward-only cursor into a sorted event list, advanced one minute at a
/// time alongside the table's time cursor. `next` is the first event whose
/// start is at or after the current minute; everything already passed is
/// folded into `busy_until`, the latest end seen, so stacked or overlapping
/// events cannot leak a false "free".
struct EventCursor<'a> {
    events: &'a [CalendarEvent],
    next: usize,
    busy_until: Option<Zoned>,
}

impl<'a> EventCursor<'a> {
    fn new(events: &'a [CalendarEvent]) -> Self {
        Self {
            events,
            next: 0,
            busy_until: None,
        }
    }

    /// Retire every event starting before `t`. Pointers only move forward,
    /// which keeps the whole sweep O(events + minutes).
    fn advance_to(&mut self, t: Zoned) {
        while let Some(ev) = self.events.get(self.next) {
            if ev.start >= t {
                break;
            }
            self.busy_until = match self.busy_until {
                Some(until) if until >= ev.end => Some(until),
                _ => Some(ev.end),
            };
            self.next += 1;
        }
    }

    fn next_event(&self) -> Option<&CalendarEvent> {
        self.events.get(self.next)
    }

    /// True while the cursor minute is strictly inside an already-started
    /// event (half-open: an event ending exactly at `t` has released it).
    fn inside_open_event(&self, t: Zoned) -> bool {
        self.busy_until.is_some_and(|until| t < until)
    }
}

fn build_agent_slots(
    events: &[CalendarEvent],
    window: Window,
    hours: BusinessHours,
) -> Result<Vec<u16>, EngineError> {
    for ev in events {
        if ev.start >= ev.end {
            return Err(EngineError::DataFault(format!(
                "event '{}' has non-positive duration",
                ev.name
            )));
        }
    }

    let total = window.total_minutes();
    let mut slots = Vec::with_capacity(total as usize + 1);
    let mut cursor = EventCursor::new(events);

    for i in 0..=total {
        let t = window.start + Duration::minutes(i);
        cursor.advance_to(t);
        slots.push(classify_minute(t, &cursor, hours));
    }
    Ok(slots)
}

/// Free minutes at one cursor position. Mutually exclusive cases, checked
/// in priority order: outside business hours; inside an open event; next
/// event starting exactly now; otherwise minutes to the next same-day event
/// start or the business-day close, whichever is nearer.
fn classify_minute(t: Zoned, cursor: &EventCursor<'_>, hours: BusinessHours) -> u16 {
    if !hours.contains(&t) {
        return 0;
    }
    if cursor.inside_open_event(t) {
        return 0;
    }
    let Some(close) = hours.close_on(t.date_naive(), t.timezone()) else {
        return 0;
    };
    let to_close = (close - t).num_minutes();

    match cursor.next_event() {
        // Free for the rest of the business day.
        None => to_close as u16,
        Some(ev) if ev.start.date_naive() != t.date_naive() => to_close as u16,
        Some(ev) if ev.start == t => 0,
        // Next event later the same date; never count past the close.
        Some(ev) => (ev.start - t).num_minutes().min(to_close) as u16,
    }
}
