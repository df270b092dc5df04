//! Label keys stamped on every launched job.
//!
//! Backends can use them to find the job again (e.g. to detect a duplicate
//! submission after a leadership handoff).

/// Catalog job name (e.g. `unit-tests`).
pub const LABEL_JOB: &str = "tagsync/job";

/// Tag the job was launched for, formatted as `namespace/stream:tag`.
pub const LABEL_TAG: &str = "tagsync/tag";

/// Source the job builds, formatted as `org/repo@branch`.
pub const LABEL_SOURCE: &str = "tagsync/source";
