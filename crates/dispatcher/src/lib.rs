//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 将每个事件并发分发到 dispatch set 中的所有 sink
//! - 单个 sink 失败不影响其他 sink
//! - 原子替换 dispatch set
//! - 根据配置创建 sink

pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{Event, Integrator};
pub use dispatcher::{all_ok, close_set, failures, DispatchSet, Dispatcher, SinkOutcome};
pub use error::DispatcherError;
pub use factory::build_dispatch_set;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::LogIntegrator;
