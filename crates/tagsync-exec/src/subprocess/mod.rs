//! Job launcher backed by an external command.
//!
//! Every launch spawns the configured command, writes the resolved `JobSpec` as JSON to its
//! stdin and classifies the exit status into success, transient or permanent failure.
mod config;
mod launcher;
mod logger;

pub use config::SubprocessConfig;
pub use launcher::SubprocessLauncher;
pub use logger::LogConfig;
