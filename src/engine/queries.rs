use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::model::*;

use super::scan::is_available;
use super::{Engine, EngineError};

/// Free blocks of at least an hour count as underutilized schedule time.
const UNDERUTILIZED_MINUTES: i64 = 60;

impl Engine {
    /// Is `agent` free for `duration_min` minutes starting at `at`?
    pub fn point_check(
        &self,
        agent: &str,
        at: Zoned,
        duration_min: i64,
    ) -> Result<bool, EngineError> {
        validate_duration(duration_min)?;
        let table = self.snapshot_for(&[agent])?;
        Ok(i64::from(table.free_minutes(agent, at)?) >= duration_min)
    }

    /// Quarter-hour slots in `[start, end]` where `agent` has at least
    /// `duration_min` free minutes, ascending.
    pub fn range_query(
        &self,
        agent: &str,
        start: Zoned,
        end: Zoned,
        duration_min: i64,
    ) -> Result<Vec<Zoned>, EngineError> {
        validate_duration(duration_min)?;
        validate_range(start, end)?;
        let table = self.snapshot_for(&[agent])?;
        collect_free_slots(&table, agent, start, end, duration_min)
    }

    /// Quarter-hour slots where every listed agent is simultaneously free
    /// for `duration_min` minutes. At least two agents required. Sorted
    /// ascending; set intersection makes agent order irrelevant.
    pub fn coordinate(
        &self,
        agents: &[String],
        start: Zoned,
        end: Zoned,
        duration_min: i64,
    ) -> Result<Vec<Zoned>, EngineError> {
        if agents.len() < 2 {
            return Err(EngineError::InvalidInput(
                "coordination requires at least two agents".into(),
            ));
        }
        validate_duration(duration_min)?;
        validate_range(start, end)?;
        let table = self.snapshot_for(agents)?;

        let mut common: Option<BTreeSet<Zoned>> = None;
        for agent in agents {
            let slots: BTreeSet<Zoned> =
                collect_free_slots(&table, agent, start, end, duration_min)?
                    .into_iter()
                    .collect();
            common = Some(match common {
                None => slots,
                Some(acc) => acc.intersection(&slots).copied().collect(),
            });
        }
        Ok(common.unwrap_or_default().into_iter().collect())
    }

    /// Quarter-hour slots on `date` with an hour or more of contiguous free
    /// time, flagging blocks worth reclaiming.
    pub fn underutilized(&self, agent: &str, date: NaiveDate) -> Result<Vec<Zoned>, EngineError> {
        let tz = self.config().timezone;
        let hours = self.config().business_hours;
        let (open, close) = hours
            .open_on(date, tz)
            .zip(hours.close_on(date, tz))
            .ok_or_else(|| EngineError::InvalidInput(format!("invalid date {date}")))?;
        let table = self.snapshot_for(&[agent])?;
        collect_free_slots(&table, agent, open, close, UNDERUTILIZED_MINUTES)
    }

    /// Single ad-hoc check via the interval scanner — no table build.
    /// Agrees with `point_check` for any in-window, in-hours interval.
    pub fn fits(&self, agent: &str, start: Zoned, end: Zoned) -> Result<bool, EngineError> {
        validate_range_strict(start, end)?;
        let events = self.source().load_events(agent)?;
        Ok(is_available(&events, &Span::new(start, end)))
    }

    /// The agent's sorted event list, as loaded.
    pub fn calendar(&self, agent: &str) -> Result<Vec<CalendarEvent>, EngineError> {
        self.source().load_events(agent)
    }
}

fn collect_free_slots(
    table: &super::AvailabilityTable,
    agent: &str,
    start: Zoned,
    end: Zoned,
    duration_min: i64,
) -> Result<Vec<Zoned>, EngineError> {
    let mut slots = Vec::new();
    for candidate in quarter_hours(start, end) {
        if i64::from(table.free_minutes(agent, candidate)?) >= duration_min {
            slots.push(candidate);
        }
    }
    Ok(slots)
}

fn validate_duration(duration_min: i64) -> Result<(), EngineError> {
    if duration_min <= 0 {
        return Err(EngineError::InvalidInput(format!(
            "duration must be positive, got {duration_min}"
        )));
    }
    Ok(())
}

fn validate_range(start: Zoned, end: Zoned) -> Result<(), EngineError> {
    if start > end {
        return Err(EngineError::InvalidInput(
            "range start is after range end".into(),
        ));
    }
    Ok(())
}

fn validate_range_strict(start: Zoned, end: Zoned) -> Result<(), EngineError> {
    if start >= end {
        return Err(EngineError::InvalidInput(
            "interval start must be before interval end".into(),
        ));
    }
    Ok(())
}
