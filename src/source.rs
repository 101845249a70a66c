use std::collections::HashMap;
use std::path::PathBuf;

use chrono_tz::Tz;

use crate::engine::EngineError;
use crate::ics;
use crate::model::CalendarEvent;

/// Where an agent's events come from. Implementations return events
/// normalized to the reference timezone and sorted by `(start, name)`.
pub trait EventSource: Send + Sync {
    fn load_events(&self, agent: &str) -> Result<Vec<CalendarEvent>, EngineError>;
}

/// Stable order for one agent's calendar: start instant, ties broken by name.
pub fn sort_events(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.name.cmp(&b.name)));
}

fn validate_events(agent: &str, events: &[CalendarEvent]) -> Result<(), EngineError> {
    for ev in events {
        if ev.start >= ev.end {
            return Err(EngineError::DataFault(format!(
                "calendar for {agent}: event '{}' has start >= end",
                ev.name
            )));
        }
    }
    Ok(())
}

/// Agent-id → ICS file roster. Files are parsed on every load: calendars
/// are small static files, and with no mutation path there is nothing to
/// cache or invalidate.
pub struct IcsRoster {
    roster: HashMap<String, PathBuf>,
    timezone: Tz,
}

impl IcsRoster {
    pub fn new(roster: HashMap<String, PathBuf>, timezone: Tz) -> Self {
        Self { roster, timezone }
    }
}

impl EventSource for IcsRoster {
    fn load_events(&self, agent: &str) -> Result<Vec<CalendarEvent>, EngineError> {
        let path = self
            .roster
            .get(agent)
            .ok_or_else(|| EngineError::NotFound(format!("no calendar for agent {agent}")))?;
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::DataFault(format!("reading {}: {e}", path.display()))
        })?;
        let mut events = ics::parse_events(&text, self.timezone)?;
        validate_events(agent, &events)?;
        sort_events(&mut events);
        tracing::debug!(agent, events = events.len(), "calendar loaded");
        Ok(events)
    }
}

/// In-memory source for tests and benches.
#[derive(Default)]
pub struct FixtureSource {
    calendars: HashMap<String, Vec<CalendarEvent>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent: &str, mut events: Vec<CalendarEvent>) -> Self {
        sort_events(&mut events);
        self.calendars.insert(agent.to_string(), events);
        self
    }
}

impl EventSource for FixtureSource {
    fn load_events(&self, agent: &str) -> Result<Vec<CalendarEvent>, EngineError> {
        let events = self
            .calendars
            .get(agent)
            .ok_or_else(|| EngineError::NotFound(format!("no calendar for agent {agent}")))?;
        validate_events(agent, events)?;
        Ok(events.clone())
    }
}
