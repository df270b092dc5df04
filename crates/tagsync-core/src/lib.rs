pub mod catalog;
pub mod controller;
pub mod error;
pub mod exclusion;
pub mod launcher;
pub mod leader;
pub mod map;
pub mod metrics;
pub mod queue;
pub mod reconcile;
pub mod tags;
pub mod tasks;

mod clock;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, CatalogError, CatalogSource, ConfigCache, FileCatalogSource};
pub use controller::{ControllerDeps, ControllerManager, ControllerSettings};
pub use error::CoreError;
pub use exclusion::ExclusionFilter;
pub use launcher::{DisabledLauncher, JobLauncher, LaunchError};
pub use leader::{
    FileLeaseBackend, LeaderElectionConfig, LeaderElector, LeaderGate, LeaderTransition,
    LeaseBackend, LeaseError, MemoryLeaseBackend,
};
pub use metrics::{LaunchOutcome, MetricsBackend, MetricsHandle, NoOpMetrics, noop_metrics};
pub use queue::WorkQueue;
pub use reconcile::{
    Outcome, ReconcilePolicy, ReconcileState, Reconciler, Resyncer, RetryBudget, SkipReason, Worker,
};
pub use tags::{
    ChangeNotifier, ChangeSource, ChannelChangeSource, FileTagSource, MemoryTagStore, TagStore,
    TagStoreError, change_channel,
};

pub mod prelude {
    pub use crate::catalog::{CatalogSource, ConfigCache};
    pub use crate::controller::{ControllerDeps, ControllerManager, ControllerSettings};
    pub use crate::error::CoreError;
    pub use crate::launcher::{JobLauncher, LaunchError};
    pub use crate::leader::{LeaderElector, LeaseBackend};
    pub use crate::tags::{ChangeSource, TagStore};
}
