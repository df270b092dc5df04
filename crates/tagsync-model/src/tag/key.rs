use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Identity of one watched image-tag resource.
///
/// Equality, hashing and ordering use all three fields.
/// Displayed (and parsed) as `namespace/stream:tag`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagKey {
    namespace: String,
    stream: String,
    tag: String,
}

impl TagKey {
    pub fn new(
        namespace: impl Into<String>,
        stream: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            stream: stream.into(),
            tag: tag.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.stream, self.tag)
    }
}

impl FromStr for TagKey {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        let invalid = || ModelError::InvalidTagKey(s.to_string());

        let (namespace, rest) = s.trim().split_once('/').ok_or_else(invalid)?;
        let (stream, tag) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if [namespace, stream, tag].iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }
        Ok(Self::new(namespace, stream, tag))
    }
}
