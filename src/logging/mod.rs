//! Logger factory.
//!
//! Builds a [`Logger`]: a `tracing` dispatcher whose registry carries one
//! [`EncoderLayer`] per sink.
//!
//! ```text
//! registry
//!   ├─ LevelFilter (minimum severity)
//!   └─ Vec<layer>  (fan-out)
//!        ├─ stdout: JSON, or console when pretty
//!        └─ file:   always JSON (optional)
//! ```
//!
//! In JSON mode every record carries the process [`BaseFields`]; pretty mode
//! leaves them out to keep console lines short. A file that cannot be opened
//! never fails construction: a diagnostic goes to stderr and the logger keeps
//! writing to stdout alone.
//!
//! # Example
//!
//! ```rust,ignore
//! use reqlog::logging::{self, Severity};
//!
//! let level: Severity = "info".parse()?;
//! let logger = logging::new(false, false, level, true, "service.log");
//! logger.init()?;
//! tracing::info!("ready");
//! ```

mod encoder;
mod severity;
mod sink;

pub use encoder::{EncoderLayer, Format};
pub use severity::{Severity, parse_severity};
pub use sink::{MemorySink, MemoryWriter, open_log_file};

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{Dispatch, Level, Span};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry};

use crate::error::LoggerError;

/// A layer that can sit next to other encoder layers on one registry.
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Process-identifying fields attached to every record in JSON mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseFields {
    pub hostname: String,
    pub pid: u32,
}

impl BaseFields {
    /// Looks up the OS hostname (`"unknown"` when unavailable) and our pid.
    pub fn detect() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            hostname,
            pid: std::process::id(),
        }
    }
}

/// Settings a [`Logger`] is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Human-readable console output instead of JSON on stdout.
    pub pretty: bool,
    /// Adds `caller` (`file:line`) to every record.
    pub debug: bool,
    pub level: Severity,
    /// Mirror every record, JSON-encoded, into `file_name`.
    pub file_logging: bool,
    pub file_name: PathBuf,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            debug: false,
            level: Severity::Info,
            file_logging: false,
            file_name: PathBuf::from("service.log"),
        }
    }
}

impl LoggerConfig {
    /// Builds a logger writing to stdout (and the file, if enabled).
    pub fn build(&self) -> Logger {
        self.build_with_writer(io::stdout)
    }

    /// Builds a logger whose primary sink is `writer` instead of stdout.
    pub fn build_with_writer<W>(&self, writer: W) -> Logger
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let base_fields = (!self.pretty).then(BaseFields::detect);

        let format = if self.pretty {
            Format::Console
        } else {
            Format::Json
        };
        let primary = EncoderLayer::new(format, writer)
            .with_min_severity(self.level)
            .with_caller(self.debug)
            .with_base_fields(base_fields.clone());

        let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
        let mut file_sink = false;

        if self.file_logging {
            match file_layer(&self.file_name, self.level) {
                Ok(layer) => {
                    layers.push(
                        layer
                            .with_caller(self.debug)
                            .with_base_fields(base_fields.clone())
                            .boxed(),
                    );
                    file_sink = true;
                }
                Err(e) => {
                    // No logger exists yet, so report on the unstructured channel.
                    eprintln!(
                        "Can't create file logger with file name {}. Error: {}",
                        self.file_name.display(),
                        e
                    );
                }
            }
        }
        layers.push(primary.boxed());

        let mut logger = Logger::from_layers(layers, self.level);
        logger.base_fields = base_fields;
        logger.file_sink = file_sink;
        logger
    }
}

/// JSON encoder layer over an append-mode file.
///
/// # Errors
///
/// Returns the I/O error when `path` cannot be opened or created.
pub fn file_layer(path: impl AsRef<Path>, level: Severity) -> io::Result<EncoderLayer<Mutex<File>>> {
    let file = open_log_file(path)?;
    Ok(EncoderLayer::json(Mutex::new(file)).with_min_severity(level))
}

/// Builds a logger from the individual settings.
///
/// Equivalent to filling a [`LoggerConfig`] and calling [`LoggerConfig::build`].
pub fn new(
    pretty: bool,
    debug: bool,
    level: Severity,
    file_logging: bool,
    file_name: impl Into<PathBuf>,
) -> Logger {
    LoggerConfig {
        pretty,
        debug,
        level,
        file_logging,
        file_name: file_name.into(),
    }
    .build()
}

/// A configured structured logger.
///
/// Cloning is cheap and clones share sinks. Encoders, sinks and base fields
/// are fixed once built.
#[derive(Debug, Clone)]
pub struct Logger {
    dispatch: Dispatch,
    level: Severity,
    base_fields: Option<BaseFields>,
    file_sink: bool,
}

impl Logger {
    /// Composes a logger from prebuilt layers, filtered at `level`.
    pub fn from_layers(layers: Vec<BoxedLayer>, level: Severity) -> Self {
        let subscriber = tracing_subscriber::registry()
            .with(layers)
            .with(level.level_filter());

        Self {
            dispatch: Dispatch::new(subscriber),
            level,
            base_fields: None,
            file_sink: false,
        }
    }

    /// Runs `f` with this logger as the current thread's dispatcher.
    ///
    /// Any `tracing` event emitted inside `f` is encoded by this logger.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Span carrying the `reqId` correlation field.
    ///
    /// The span belongs to this logger whichever dispatcher is current, so it
    /// may be created outside [`Logger::in_scope`] and entered inside it.
    /// Records emitted while it is entered carry `reqId`. It is created at
    /// `ERROR` level so that no severity filter drops it.
    pub fn with_request_id(&self, id: &str) -> Span {
        self.in_scope(|| tracing::span!(Level::ERROR, "request", reqId = id))
    }

    /// Installs this logger as the process-wide dispatcher.
    ///
    /// # Errors
    ///
    /// Fails if a global dispatcher was already installed.
    pub fn init(&self) -> Result<(), LoggerError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())?;
        Ok(())
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn base_fields(&self) -> Option<&BaseFields> {
        self.base_fields.as_ref()
    }

    /// Whether records are also mirrored into a log file.
    pub fn has_file_sink(&self) -> bool {
        self.file_sink
    }

    /// Logs `msg` at FATAL and terminates the process with status 1.
    pub fn fatal(&self, msg: &str) -> ! {
        self.in_scope(|| tracing::error!(__severity = "fatal", "{msg}"));
        std::process::exit(1)
    }

    /// Logs `msg` at PANIC and panics with the same message.
    pub fn panic(&self, msg: &str) -> ! {
        self.in_scope(|| tracing::error!(__severity = "panic", "{msg}"));
        panic!("{msg}")
    }
}
