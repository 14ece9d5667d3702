//! Built-in sinks

mod log;

pub use self::log::LogIntegrator;
