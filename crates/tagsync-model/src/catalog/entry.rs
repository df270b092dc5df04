use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Lookup key of the job catalog: organization, repository and branch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogKey {
    pub org: String,
    pub repo: String,
    pub branch: String,
}

impl CatalogKey {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.org, self.repo, self.branch)
    }
}

/// Opaque job definition as stored in the catalog.
///
/// The controller never interprets it; it is forwarded verbatim to the launcher.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobDefinition(pub serde_json::Value);

/// Jobs configured for one organization/repository/branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCatalogEntry {
    pub org: String,
    pub repo: String,
    pub branch: String,
    /// Job definitions keyed by job name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub jobs: BTreeMap<String, JobDefinition>,
}

impl JobCatalogEntry {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            branch: branch.into(),
            jobs: BTreeMap::new(),
        }
    }

    /// Builder-style helper to add a job.
    pub fn with_job(mut self, name: impl Into<String>, def: JobDefinition) -> Self {
        self.jobs.insert(name.into(), def);
        self
    }

    pub fn key(&self) -> CatalogKey {
        CatalogKey::new(&self.org, &self.repo, &self.branch)
    }
}
