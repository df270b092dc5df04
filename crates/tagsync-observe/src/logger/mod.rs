mod config;
mod error;
mod log;
mod object;

pub use config::LoggerConfig;
pub use error::{LoggerError, LoggerResult};
pub use object::{LoggerFormat, LoggerLevel, LoggerRfc3339};

/// Install the global tracing subscriber described by `cfg`.
///
/// Must be called once, before the runtime starts emitting events. A second call returns
/// [`LoggerError::AlreadyInitialized`].
///
/// # Examples
/// ```rust
/// use tagsync_observe::{LoggerConfig, init_logger};
///
/// init_logger(&LoggerConfig::default()).expect("logger");
/// tracing::info!("logger initialized");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    match cfg.format {
        LoggerFormat::Text => log::logger_text(cfg),
        LoggerFormat::Json => log::logger_json(cfg),
        LoggerFormat::Journald => log::logger_journald(cfg),
    }
}
