use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::LogConfig;
use crate::ExecError;

/// Backend command settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubprocessConfig {
    /// Command to execute (e.g. `"/usr/local/bin/submit-job"`).
    pub command: String,
    /// Command-line arguments passed to the command.
    pub args: Vec<String>,
    /// Extra environment for the command, on top of the inherited one.
    pub env: BTreeMap<String, String>,
    /// Working directory; inherited when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Exit codes meaning "rejected, do not retry". Any other non-zero code is transient.
    pub permanent_exit_codes: Vec<i32>,
    #[serde(skip)]
    pub output: LogConfig,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            permanent_exit_codes: vec![2],
            output: LogConfig::default(),
        }
    }
}

impl SubprocessConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration before any launch.
    ///
    /// Rules:
    /// - `command` is not empty or whitespace-only;
    /// - `0` is not listed as a permanent exit code.
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.command.trim().is_empty() {
            return Err(ExecError::InvalidConfig("launcher command is empty".into()));
        }
        if self.permanent_exit_codes.contains(&0) {
            return Err(ExecError::InvalidConfig(
                "exit code 0 cannot be a permanent failure".into(),
            ));
        }
        Ok(())
    }

    pub fn is_permanent(&self, code: i32) -> bool {
        self.permanent_exit_codes.contains(&code)
    }

    /// Emit a trace-level log with the essential configuration fields.
    pub fn trace_state(&self) {
        trace!(
            command = %self.command,
            args = ?self.args,
            cwd = ?self.cwd,
            env_len = self.env.len(),
            permanent_exit_codes = ?self.permanent_exit_codes,
            "subprocess launcher config resolved"
        );
    }
}

impl fmt::Display for SubprocessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SubprocessConfig(cmd='{}', args={}, env={}, cwd={:?})",
            self.command,
            self.args.len(),
            self.env.len(),
            self.cwd,
        )
    }
}
