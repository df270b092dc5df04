//! Conversions from model strategies to taskvisor policies.
mod backoff;
mod jitter;
mod spec;

pub use backoff::to_backoff_policy;
pub use jitter::to_jitter_policy;
pub use spec::to_task_spec;
