/// Engine fault taxonomy. All variants are recoverable at the request
/// boundary; the engine itself never aborts the process.
#[derive(Debug)]
pub enum EngineError {
    /// Malformed request: non-positive duration, inverted range, too few agents.
    InvalidInput(String),
    /// Unknown agent, or an instant with no entry in the materialized window.
    NotFound(String),
    /// A calendar failed to load or violated the event invariants. Never
    /// downgraded to "available" — a corrupt calendar must surface.
    DataFault(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::NotFound(msg) => write!(f, "not found: {msg}"),
            EngineError::DataFault(msg) => write!(f, "calendar data fault: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
