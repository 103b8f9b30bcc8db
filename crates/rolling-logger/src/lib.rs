//! Rolling Logger
//!
//! Keeps the most recent log records in a fixed-size circular buffer and
//! forwards every record to a sink (the browser console on wasm, stderr
//! elsewhere). Accepts records from both `tracing` and `log`.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

/// Default number of records kept in memory
pub const DEFAULT_CAPACITY: usize = 256;

/// A single captured log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub at: DateTime<Utc>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>5} [{}] {}",
            self.at.format("%H:%M:%S%.3f"),
            self.level,
            self.target,
            self.message
        )
    }
}

// ========================
// Ring Buffer
// ========================

/// Fixed-capacity buffer; the oldest record is evicted first
#[derive(Debug)]
pub struct RingBuffer {
    capacity: usize,
    records: VecDeque<LogRecord>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: LogRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.records.iter().cloned().collect()
    }
}

/// Shared handle to the buffer used by both the layer and the `log` bridge
#[derive(Debug, Clone)]
pub struct RollingLog {
    buffer: Arc<Mutex<RingBuffer>>,
    min_level: Level,
}

impl RollingLog {
    pub fn new(capacity: usize, min_level: Level) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(RingBuffer::new(capacity))),
            min_level,
        }
    }

    /// Record a line and forward it to the sink
    pub fn record(&self, level: Level, target: &str, message: String) {
        if level > self.min_level {
            return;
        }
        let record = LogRecord {
            at: Utc::now(),
            level,
            target: target.to_string(),
            message,
        };
        emit(&record);
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(record);
        }
    }

    /// Copy of the buffered records, oldest first
    pub fn recent(&self) -> Vec<LogRecord> {
        self.buffer
            .lock()
            .map(|buffer| buffer.snapshot())
            .unwrap_or_default()
    }

    /// Buffered records rendered one per line, for bug reports
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for record in self.recent() {
            let _ = writeln!(out, "{record}");
        }
        out
    }
}

// ========================
// Sinks
// ========================

#[cfg(target_arch = "wasm32")]
fn emit(record: &LogRecord) {
    let line = wasm_line(record);
    match record.level {
        Level::ERROR => web_sys::console::error_1(&line.into()),
        Level::WARN => web_sys::console::warn_1(&line.into()),
        Level::INFO => web_sys::console::info_1(&line.into()),
        _ => web_sys::console::debug_1(&line.into()),
    }
}

#[cfg(target_arch = "wasm32")]
fn wasm_line(record: &LogRecord) -> String {
    format!("[{}] {}", record.target, record.message)
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(record: &LogRecord) {
    eprintln!("{record}");
}

// ========================
// tracing Layer
// ========================

/// Collects the `message` field plus any extra fields as `key=value`
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl MessageVisitor {
    fn finish(self) -> String {
        self.message + &self.fields
    }
}

/// `tracing_subscriber` layer writing into a [`RollingLog`]
pub struct RollingLayer {
    log: RollingLog,
}

impl RollingLayer {
    pub fn new(log: RollingLog) -> Self {
        Self { log }
    }
}

impl<S: Subscriber> Layer<S> for RollingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.log.record(*meta.level(), meta.target(), visitor.finish());
    }
}

// ========================
// log Bridge
// ========================

struct LogBridge {
    log: RollingLog,
}

fn level_from_log(level: log::Level) -> Level {
    match level {
        log::Level::Error => Level::ERROR,
        log::Level::Warn => Level::WARN,
        log::Level::Info => Level::INFO,
        log::Level::Debug => Level::DEBUG,
        log::Level::Trace => Level::TRACE,
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        level_from_log(metadata.level()) <= self.log.min_level
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            self.log.record(
                level_from_log(record.level()),
                record.target(),
                record.args().to_string(),
            );
        }
    }

    fn flush(&self) {}
}

// ========================
// Installation
// ========================

static INSTALLED: OnceLock<RollingLog> = OnceLock::new();

/// Install the global `tracing` subscriber and `log` logger once.
///
/// Later calls return the already-installed handle.
pub fn install(capacity: usize, min_level: Level) -> RollingLog {
    INSTALLED
        .get_or_init(|| {
            let log = RollingLog::new(capacity, min_level);
            let subscriber = tracing_subscriber::registry().with(RollingLayer::new(log.clone()));
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                eprintln!("rolling-logger: a global tracing subscriber was already set");
            }
            if log::set_boxed_logger(Box::new(LogBridge { log: log.clone() })).is_ok() {
                log::set_max_level(log::LevelFilter::Trace);
            }
            log
        })
        .clone()
}

/// The installed handle, if [`install`] has run
pub fn installed() -> Option<RollingLog> {
    INSTALLED.get().cloned()
}
