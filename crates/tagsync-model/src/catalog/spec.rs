use serde::{Deserialize, Serialize};

use super::JobDefinition;
use crate::{LABEL_JOB, LABEL_SOURCE, LABEL_TAG, Labels, SourceRef, TagKey};

/// Fully resolved request handed to the job launcher.
///
/// A `JobSpec` is derived purely from the tag and the catalog entry, so two launches for the
/// same tag state produce equal specs. Backends rely on that to absorb duplicate submissions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Catalog job name.
    pub job: String,
    /// Namespace the job is created in.
    pub namespace: String,
    /// Tag that triggered the launch.
    pub tag: TagKey,
    /// Resolved source (organization, repository, branch).
    pub source: SourceRef,
    /// Catalog definition, forwarded verbatim.
    pub definition: JobDefinition,
    /// Identification labels, see [`LABEL_JOB`], [`LABEL_TAG`], [`LABEL_SOURCE`].
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
}

impl JobSpec {
    pub fn new(
        job: impl Into<String>,
        namespace: impl Into<String>,
        tag: TagKey,
        source: SourceRef,
        definition: JobDefinition,
    ) -> Self {
        let job = job.into();
        let mut labels = Labels::new();
        labels
            .insert(LABEL_JOB, job.as_str())
            .insert(LABEL_TAG, tag.to_string())
            .insert(LABEL_SOURCE, source.to_string());

        Self {
            job,
            namespace: namespace.into(),
            tag,
            source,
            definition,
            labels,
        }
    }

    /// Stable identifier for duplicate detection by the backend.
    pub fn idempotency_key(&self) -> String {
        format!("{}/{}#{}", self.namespace, self.tag, self.job)
    }
}
