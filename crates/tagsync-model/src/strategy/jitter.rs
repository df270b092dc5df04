use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};

/// How random jitter is applied to background task backoff delays.
///
/// Spreads restarts of identical tasks across a fleet of redundant instances.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JitterStrategy {
    /// Deterministic delays.
    None,
    /// Delay uniformly sampled from `[0, base]`.
    #[default]
    Full,
    /// Delay sampled around `base / 2`.
    Equal,
    /// Delay sampled from `min(max, rand(base * 3))`.
    Decorrelated,
}

impl FromStr for JitterStrategy {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" => Ok(JitterStrategy::Equal),
            "" | "none" => Ok(JitterStrategy::None),
            "full" | "default" => Ok(JitterStrategy::Full),
            "decorrelated" => Ok(JitterStrategy::Decorrelated),
            other => Err(ModelError::UnknownJitter(other.to_string())),
        }
    }
}
