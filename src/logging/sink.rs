//! Record destinations.
//!
//! Every sink is a [`MakeWriter`]. Encoder layers render a whole record into a
//! buffer first and hand it to the writer in a single `write_all`, so sinks only
//! need to serialize individual writes:
//!
//! - stdout: `std::io::stdout` (locked per write by the standard library)
//! - file: `Mutex<File>` opened in append mode by [`open_log_file`]
//! - memory: [`MemorySink`], shared buffer used by tests and embedders

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

/// Opens `path` for appending, creating it when absent.
///
/// New files are created with mode `0644` on unix. No rotation or size
/// bounding is applied: the file grows for as long as the logger lives.
///
/// # Errors
///
/// Returns the underlying I/O error when the file cannot be opened or created.
pub fn open_log_file(path: impl AsRef<Path>) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.append(true).create(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    options.open(path)
}

/// In-memory sink collecting newline-delimited records.
///
/// Clones share the same buffer, so one clone can be handed to a logger and
/// another kept to inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Non-empty lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Every line parsed as a JSON object.
    ///
    /// # Errors
    ///
    /// Fails on the first line that is not valid JSON (e.g. console output).
    pub fn json_records(&self) -> serde_json::Result<Vec<serde_json::Value>> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line))
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Writer handed out by [`MemorySink`] for one record.
pub struct MemoryWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MemorySink {
    type Writer = MemoryWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MemoryWriter {
            buf: self.buf.clone(),
        }
    }
}
