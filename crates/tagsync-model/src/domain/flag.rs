use serde::{Deserialize, Serialize};

/// Boolean switch with explicit enable/disable semantics.
///
/// Used for operating modes such as dry-run, where reading `dry_run.is_enabled()`
/// at the call site is clearer than a bare `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flag(bool);

impl Flag {
    pub const fn enabled() -> Self {
        Self(true)
    }

    pub const fn disabled() -> Self {
        Self(false)
    }

    pub const fn is_enabled(&self) -> bool {
        self.0
    }

    pub const fn is_disabled(&self) -> bool {
        !self.0
    }
}

/// Defaults to enabled: a flag that is forgotten in config fails safe.
impl Default for Flag {
    fn default() -> Self {
        Self::enabled()
    }
}

impl From<bool> for Flag {
    fn from(b: bool) -> Self {
        Self(b)
    }
}

impl From<Flag> for bool {
    fn from(f: Flag) -> Self {
        f.0
    }
}
