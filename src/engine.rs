mod error;
mod queries;
mod scan;
mod table;

pub use error::EngineError;
pub use scan::is_available;
pub use table::AvailabilityTable;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::model::CalendarEvent;
use crate::source::EventSource;

/// Query façade over one roster of calendars. Holds only an explicit config
/// and an event source; every query materializes its own immutable table
/// snapshot, so concurrent requests never share mutable state.
pub struct Engine {
    config: Config,
    source: Arc<dyn EventSource>,
}

impl Engine {
    pub fn new(config: Config, source: Arc<dyn EventSource>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn source(&self) -> &dyn EventSource {
        self.source.as_ref()
    }

    /// Load events and materialize a fresh availability table for the given
    /// agents over the configured preprocessing window.
    pub(crate) fn snapshot_for<S: AsRef<str>>(
        &self,
        agents: &[S],
    ) -> Result<AvailabilityTable, EngineError> {
        let build_start = Instant::now();
        let mut event_lists: HashMap<String, Vec<CalendarEvent>> =
            HashMap::with_capacity(agents.len());
        for agent in agents {
            let agent = agent.as_ref();
            if !event_lists.contains_key(agent) {
                event_lists.insert(agent.to_string(), self.source.load_events(agent)?);
            }
        }

        let table =
            AvailabilityTable::build(&event_lists, self.config.window, self.config.business_hours)?;

        metrics::histogram!(crate::observability::TABLE_BUILD_DURATION_SECONDS)
            .record(build_start.elapsed().as_secs_f64());
        // Duplicated agent ids are materialized once; count what was built.
        metrics::histogram!(crate::observability::TABLE_MINUTES_MATERIALIZED)
            .record((self.config.window.total_minutes() + 1) as f64 * event_lists.len() as f64);
        tracing::debug!(
            agents = event_lists.len(),
            minutes = self.config.window.total_minutes() + 1,
            "availability table built"
        );
        Ok(table)
    }
}
