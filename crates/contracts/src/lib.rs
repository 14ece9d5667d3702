//! # Contracts
//!
//! Frozen interface contracts shared by every integration crate: event and command
//! data structures, the `Integrator` trait, configuration types and error taxonomy.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Identity Model
//! - Every event carries `application_id` (u64) and a 64-bit device EUI
//! - Topics and logs render the EUI as 16 lowercase hex characters

mod command;
mod config;
mod dev_eui;
mod error;
mod event;
mod integrator;
mod kv;
pub mod wire;

pub use command::*;
pub use config::*;
pub use dev_eui::{DevEui, DevEuiError};
pub use error::*;
pub use event::*;
pub use integrator::*;
pub use kv::{KeyValueStore, MemoryStore, StoreError};
