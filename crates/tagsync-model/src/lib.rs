mod domain;
pub use domain::{Flag, Labels};
pub use domain::{LABEL_JOB, LABEL_SOURCE, LABEL_TAG};

mod error;
pub use error::{ModelError, ModelResult};

mod tag;
pub use tag::{ChangeKind, EnqueueReason, ReconcileRequest, SourceRef, TagChange, TagInfo, TagKey};

mod catalog;
pub use catalog::{CatalogKey, JobCatalogEntry, JobDefinition, JobSpec};

mod strategy;
pub use strategy::{BackoffStrategy, JitterStrategy, RetryStrategy};
