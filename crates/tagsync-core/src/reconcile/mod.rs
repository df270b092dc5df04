//! Reconciliation engine.
//!
//! A [`Reconciler`] settles one request against live state; [`Worker`]s drain the
//! [`crate::WorkQueue`] through it and apply the retry discipline; the [`Resyncer`] feeds the
//! queue from full sweeps and from the change stream.
mod outcome;
pub use outcome::{Outcome, ReconcileState, RetryBudget, SkipReason};

mod reconciler;
pub use reconciler::{ReconcilePolicy, Reconciler};

mod worker;
pub use worker::Worker;

mod resync;
pub use resync::Resyncer;
