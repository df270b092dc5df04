use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

use super::object::{LoggerFormat, LoggerLevel};

/// Logger section of the controller configuration.
///
/// Every field is optional in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerConfig {
    /// Output format.
    pub format: LoggerFormat,
    /// Filter expression (e.g. `"info"`, `"tagsync_core=debug,info"`).
    pub level: LoggerLevel,
    /// Include module/target names in the output.
    pub with_targets: bool,
    /// Colored text output; only honoured when stdout is a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Color is used only if enabled and stdout is a terminal.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}
