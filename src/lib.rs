pub mod config;
pub mod engine;
pub mod http;
pub mod ics;
pub mod model;
pub mod observability;
pub mod source;
