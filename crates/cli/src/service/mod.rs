//! Service orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Service, ServiceOptions};
pub use stats::ServiceStats;
