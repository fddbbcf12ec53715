//! Per-server logging.

use std::fmt;
use std::str::FromStr;
use log::{Level, LevelFilter};

/// Environment variable selecting the default log verbosity.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

const LOG_TARGET: &str = "stubhttp";

/// Parse a verbosity name.
///
/// Accepts the `log` level names case-insensitively, plus `fatal` (nothing is
/// logged) and `all` (everything is logged). Anything else means `error`.
pub fn parse_level(value: &str) -> LevelFilter {
    let value = value.trim();
    if value.eq_ignore_ascii_case("fatal") {
        return LevelFilter::Off;
    }
    if value.eq_ignore_ascii_case("all") {
        return LevelFilter::Trace;
    }
    LevelFilter::from_str(value).unwrap_or(LevelFilter::Error)
}

/// The verbosity selected by [`LOG_LEVEL_ENV`], or `error` when unset.
pub fn level_from_env() -> LevelFilter {
    std::env::var(LOG_LEVEL_ENV)
        .map(|value| parse_level(&value))
        .unwrap_or(LevelFilter::Error)
}

/// A logger scoped to one server instance.
///
/// Records go through the `log` facade under the `stubhttp` target, gated by
/// the server's own level and prefixed with its category (`stubhttp:<port>`
/// once the server is bound).
#[derive(Debug, Clone)]
pub(crate) struct ServerLogger {
    category: String,
    level: LevelFilter,
}

impl ServerLogger {
    pub(crate) fn new(level: LevelFilter) -> Self {
        Self {
            category: LOG_TARGET.to_string(),
            level,
        }
    }

    pub(crate) fn for_port(&self, port: u16) -> Self {
        Self {
            category: format!("{LOG_TARGET}:{port}"),
            level: self.level,
        }
    }

    pub(crate) fn category(&self) -> &str {
        &self.category
    }

    pub(crate) fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub(crate) fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if self.enabled(level) {
            log::log!(target: LOG_TARGET, level, "[{}] {}", self.category(), args);
        }
    }

    pub(crate) fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub(crate) fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}
