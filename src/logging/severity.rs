//! Ordered log severities and their parser.

use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;

use crate::error::UnknownLevel;

/// Field set by [`Logger::fatal`](super::Logger::fatal) and
/// [`Logger::panic`](super::Logger::panic) to lift an `ERROR` event above
/// `Error`. Ordinary fields named `severity` are left alone.
pub(crate) const SEVERITY_FIELD: &str = "__severity";

/// Log importance, lowest first.
///
/// `Fatal` and `Panic` have no `tracing::Level` of their own. They are emitted
/// as `ERROR` events carrying the reserved `__severity` field, which the
/// encoder layers honour both for filtering and for the rendered level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Panic,
}

impl Severity {
    /// Lower-case name written into the `level` key of a record.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Panic => "panic",
        }
    }

    /// Coarsest tracing filter that still lets this severity through.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Severity::Debug => LevelFilter::TRACE,
            Severity::Info => LevelFilter::INFO,
            Severity::Warning => LevelFilter::WARN,
            Severity::Error | Severity::Fatal | Severity::Panic => LevelFilter::ERROR,
        }
    }

    /// Severity of a plain tracing event. `TRACE` folds into `Debug`.
    pub fn from_level(level: &Level) -> Self {
        match *level {
            Level::TRACE | Level::DEBUG => Severity::Debug,
            Level::INFO => Severity::Info,
            Level::WARN => Severity::Warning,
            Level::ERROR => Severity::Error,
        }
    }

    /// Whether stack traces are captured for records at this severity.
    pub fn captures_stacktrace(self) -> bool {
        self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "FATAL" => Ok(Severity::Fatal),
            "PANIC" => Ok(Severity::Panic),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// Parses a severity name case-insensitively.
///
/// # Errors
///
/// Returns [`UnknownLevel`] carrying `input` for anything but `DEBUG`, `INFO`,
/// `WARNING`, `ERROR`, `FATAL` or `PANIC`.
pub fn parse_severity(input: &str) -> Result<Severity, UnknownLevel> {
    input.parse()
}
