//! Optional process run counter.
//!
//! An observability aid, not load-bearing: when a path is configured, each
//! process start reads the last stored count, increments, and writes it back
//! atomically; a graceful shutdown clears the file. Without a path every
//! start is run 1. Only one supervisor process is expected per deployment,
//! so the read-modify-write is not locked against concurrent writers.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::warn;

pub struct RunCounter {
    path: Option<PathBuf>,
}

impl RunCounter {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Read, increment, and persist the run count. Persistence failures are
    /// logged and the incremented count is still returned.
    pub fn next(&self) -> u64 {
        let Some(path) = &self.path else {
            return 1;
        };

        let last: u64 = fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        let count = last + 1;

        if let Err(e) = write_atomic(path, count) {
            warn!(path = %path.display(), error = %e, "failed to persist run count");
        }
        count
    }

    /// Remove the persisted count on graceful shutdown.
    pub fn clear(&self) {
        let Some(path) = &self.path else {
            return;
        };
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to clear run count"),
        }
    }
}

fn write_atomic(path: &PathBuf, count: u64) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, count.to_string())?;
    fs::rename(tmp, path)
}
