//! Rolling Logger
//!
//! File logger that rolls `<app>.log` over to `<app>.log.1` at a size limit
//! and keeps the most recent lines in a circular buffer, so a dashboard can
//! show recent activity without reading the file back.
//!
//! `log` records from library crates are bridged into the tracing subscriber.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;

pub use tracing::Level;

/// Logger tuning
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    /// Roll the file over once it would grow past this many bytes
    pub max_file_bytes: u64,
    /// Lines kept in memory
    pub buffer_lines: usize,
    pub level: tracing::Level,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 2 * 1024 * 1024,
            buffer_lines: 500,
            level: tracing::Level::INFO,
        }
    }
}

#[derive(Debug)]
pub enum LoggerError {
    Io(io::Error),
    AlreadyInitialized(String),
}

impl std::fmt::Display for LoggerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggerError::Io(e) => write!(f, "Log file error: {}", e),
            LoggerError::AlreadyInitialized(msg) => write!(f, "Logger already initialized: {}", msg),
        }
    }
}

impl std::error::Error for LoggerError {}

impl From<io::Error> for LoggerError {
    fn from(e: io::Error) -> Self {
        LoggerError::Io(e)
    }
}

/// Handle returned by [`init_logger`]
#[derive(Clone)]
pub struct LoggerHandle {
    writer: RollingWriter,
}

impl LoggerHandle {
    /// Most recent log lines, oldest first
    pub fn recent_lines(&self) -> Vec<String> {
        self.writer.recent_lines()
    }

    pub fn log_path(&self) -> PathBuf {
        lock(&self.writer.file).path.clone()
    }
}

/// Initialize the global logger writing into `log_dir/<app_name>.log`
pub fn init_logger(log_dir: PathBuf, app_name: &str) -> Result<LoggerHandle, LoggerError> {
    init_logger_with(log_dir, app_name, LoggerOptions::default())
}

pub fn init_logger_with(
    log_dir: PathBuf,
    app_name: &str,
    options: LoggerOptions,
) -> Result<LoggerHandle, LoggerError> {
    let writer = RollingWriter::open(&log_dir, app_name, options.max_file_bytes, options.buffer_lines)?;

    tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_ansi(false)
        .with_timer(LocalTime)
        .with_max_level(options.level)
        .try_init()
        .map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))?;

    log::info!("[{}] Logger initialized at {}", app_name, log_dir.display());
    Ok(LoggerHandle { writer })
}

/// Local wall-clock timestamps
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

struct RollingFile {
    path: PathBuf,
    rolled_path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
}

impl RollingFile {
    fn open(path: PathBuf, max_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        let mut rolled = path.clone().into_os_string();
        rolled.push(".1");
        Ok(Self {
            path,
            rolled_path: PathBuf::from(rolled),
            file,
            written,
            max_bytes,
        })
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.roll()?;
        }
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, &self.rolled_path)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

/// `MakeWriter` shared by every event
#[derive(Clone)]
pub struct RollingWriter {
    file: Arc<Mutex<RollingFile>>,
    buffer: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl RollingWriter {
    pub fn open(log_dir: &Path, app_name: &str, max_file_bytes: u64, buffer_lines: usize) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let path = log_dir.join(format!("{}.log", app_name));
        Ok(Self {
            file: Arc::new(Mutex::new(RollingFile::open(path, max_file_bytes)?)),
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(buffer_lines))),
            capacity: buffer_lines,
        })
    }

    pub fn recent_lines(&self) -> Vec<String> {
        lock(&self.buffer).iter().cloned().collect()
    }

    fn remember(&self, buf: &[u8]) {
        if self.capacity == 0 {
            return;
        }
        let text = String::from_utf8_lossy(buf);
        let mut ring = lock(&self.buffer);
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(line.to_string());
        }
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.file).write_all(buf)?;
        self.remember(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.file).file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
