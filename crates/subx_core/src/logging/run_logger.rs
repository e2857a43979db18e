//! Log of one extraction run.
//!
//! A run log goes to `<log_dir>/<run_id>.log` and, line by line, to an
//! optional front-end sink. Handles are cheap to clone so OCR progress
//! callbacks can write into the same log as the coordinator.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};
use crate::output::sanitize_file_stem;

/// Shared handle to a run log.
#[derive(Clone)]
pub struct RunLogger {
    inner: Arc<Inner>,
}

struct Inner {
    run_id: String,
    log_path: Option<PathBuf>,
    config: LogConfig,
    sink: Option<LogCallback>,
    state: Mutex<ItemState>,
}

/// Mutable part, reset for every queue item.
struct ItemState {
    file: Option<BufWriter<File>>,
    /// Last lines of tool output for the item being processed.
    recent: VecDeque<String>,
    /// Progress bucket last written, `None` before the first update.
    progress_bucket: Option<u32>,
}

impl RunLogger {
    /// Log to a new file in `log_dir` named after the run.
    pub fn new(
        run_id: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        sink: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let run_id = run_id.into();
        fs::create_dir_all(log_dir.as_ref())?;
        let path = log_dir.as_ref().join(format!("{}.log", sanitize_file_stem(&run_id)));
        let file = BufWriter::new(File::create(&path)?);
        Ok(Self::build(run_id, Some((path, file)), config, sink))
    }

    /// Log only to the sink.
    pub fn detached(run_id: impl Into<String>, config: LogConfig, sink: Option<LogCallback>) -> Self {
        Self::build(run_id.into(), None, config, sink)
    }

    fn build(
        run_id: String,
        file: Option<(PathBuf, BufWriter<File>)>,
        config: LogConfig,
        sink: Option<LogCallback>,
    ) -> Self {
        let (log_path, file) = match file {
            Some((path, writer)) => (Some(path), Some(writer)),
            None => (None, None),
        };
        let state = ItemState {
            file,
            recent: VecDeque::with_capacity(config.error_tail.max(1)),
            progress_bucket: None,
        };
        Self {
            inner: Arc::new(Inner {
                run_id,
                log_path,
                config,
                sink,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.inner.log_path.as_deref()
    }

    pub fn debug(&self, message: &str) {
        self.emit(LogLevel::Debug, MessagePrefix::None, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(LogLevel::Info, MessagePrefix::None, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(LogLevel::Warn, MessagePrefix::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(LogLevel::Error, MessagePrefix::Error, message);
    }

    /// An external program invocation.
    pub fn command(&self, command: &str) {
        self.emit(LogLevel::Info, MessagePrefix::Command, command);
    }

    /// Start of a queue item.
    pub fn phase(&self, name: &str) {
        self.emit(LogLevel::Info, MessagePrefix::Phase, name);
    }

    pub fn section(&self, name: &str) {
        self.emit(LogLevel::Info, MessagePrefix::Section, name);
    }

    pub fn success(&self, message: &str) {
        self.emit(LogLevel::Info, MessagePrefix::Success, message);
    }

    /// Forget the previous item's tool output and progress.
    pub fn begin_item(&self) {
        let mut state = self.inner.state.lock();
        state.recent.clear();
        state.progress_bucket = None;
    }

    /// Record a progress percentage for the current item.
    ///
    /// In compact mode only the first update of each `progress_step`
    /// bucket is written, plus 100%. Returns whether a line was written.
    pub fn progress(&self, percent: u32) -> bool {
        let percent = percent.min(100);
        let config = &self.inner.config;
        let bucket = match (config.compact, percent) {
            (false, _) => percent,
            (true, 100) => u32::MAX,
            (true, _) => percent / config.progress_step.max(1),
        };

        {
            let mut state = self.inner.state.lock();
            if state.progress_bucket.is_some_and(|last| bucket <= last) {
                return false;
            }
            state.progress_bucket = Some(bucket);
        }

        self.emit(LogLevel::Info, MessagePrefix::None, &format!("Progress: {}%", percent));
        true
    }

    /// A line printed by an external tool.
    ///
    /// Always kept in the recent buffer; written out only outside compact
    /// mode.
    pub fn tool_output(&self, line: &str) {
        {
            let mut state = self.inner.state.lock();
            let capacity = self.inner.config.error_tail.max(1);
            while state.recent.len() >= capacity {
                state.recent.pop_front();
            }
            state.recent.push_back(line.to_string());
        }
        if !self.inner.config.compact {
            self.emit(LogLevel::Debug, MessagePrefix::None, line);
        }
    }

    /// Write the buffered tool output under a `[label]` header.
    pub fn dump_recent(&self, label: &str) {
        let lines = self.recent();
        if lines.is_empty() {
            return;
        }
        self.write_line(&format!("[{} output, last {} lines]", label, lines.len()));
        for line in &lines {
            self.write_line(&format!("  {}", line));
        }
    }

    pub fn recent(&self) -> Vec<String> {
        self.inner.state.lock().recent.iter().cloned().collect()
    }

    /// Flush and stop writing to the file. The sink keeps working.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if let Some(mut file) = state.file.take() {
            let _ = file.flush();
        }
    }

    fn emit(&self, level: LogLevel, prefix: MessagePrefix, message: &str) {
        if level >= self.inner.config.level {
            self.write_line(&prefix.format(message));
        }
    }

    fn write_line(&self, text: &str) {
        let line = if self.inner.config.show_timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S"), text)
        } else {
            text.to_string()
        };

        if let Some(file) = self.inner.state.lock().file.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
        if let Some(sink) = &self.inner.sink {
            sink(&line);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(file) = self.state.get_mut().file.as_mut() {
            let _ = file.flush();
        }
    }
}
