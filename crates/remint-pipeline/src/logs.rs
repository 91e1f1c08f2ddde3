//! Per-job textual log streams.
//!
//! Worker tasks carry a job key that selects the sink; the sink interface is
//! threaded through [`crate::PipelineEnv`] rather than living in a global or
//! a thread-local.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

pub trait LogSink: Send + Sync {
    fn line(&self, key: &str, message: &str);
}

/// Appends to `logs/<key>.log` under a fixed directory. Path separators in
/// keys become directory structure (`mojang/1.20.4` logs under
/// `logs/mojang/1.20.4.log`).
pub struct FileLogSink {
    dir: PathBuf,
    open_files: Mutex<HashMap<String, File>>,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open_files: Mutex::new(HashMap::new()),
        }
    }

    fn write_line(&self, key: &str, message: &str) -> std::io::Result<()> {
        let mut open_files = self.open_files.lock().expect("log sink lock");
        if !open_files.contains_key(key) {
            let path = self.dir.join(format!("{key}.log"));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            open_files.insert(key.to_string(), file);
        }
        let file = open_files.get_mut(key).expect("just inserted");
        writeln!(file, "{message}")
    }
}

impl LogSink for FileLogSink {
    fn line(&self, key: &str, message: &str) {
        if let Err(err) = self.write_line(key, message) {
            tracing::error!(
                target = "remint.pipeline",
                key,
                error = %err,
                "failed to write job log line"
            );
        }
    }
}

/// Collects lines in memory; the sink used by tests.
#[derive(Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<(String, String)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(String, String)> {
        self.lines.lock().expect("log sink lock").clone()
    }
}

impl LogSink for MemoryLogSink {
    fn line(&self, key: &str, message: &str) {
        self.lines
            .lock()
            .expect("log sink lock")
            .push((key.to_string(), message.to_string()));
    }
}
