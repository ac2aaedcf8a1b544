use parking_lot::Mutex;

/// Minimal logger for core so the pipeline doesn't pick a logging backend.
/// The CLI adapts it to `tracing`; tests use [`MemoryLog`].
pub trait CoreLog: Send + Sync {
    fn info(&self, msg: &str) {
        let _ = msg;
    }
    fn warn(&self, msg: &str) {
        let _ = msg;
    }
    fn error(&self, msg: &str) {
        let _ = msg;
    }
    fn debug(&self, msg: &str) {
        let _ = msg;
    }
}

/// No-op logger if you don't care about logs.
pub struct NoopLog;
impl CoreLog for NoopLog {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Keeps every line in memory. Handy for asserting that something was warned about.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(lvl, _)| *lvl == LogLevel::Warn)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn push(&self, level: LogLevel, msg: &str) {
        self.lines.lock().push((level, msg.to_string()));
    }
}

impl CoreLog for MemoryLog {
    fn info(&self, msg: &str) {
        self.push(LogLevel::Info, msg);
    }
    fn warn(&self, msg: &str) {
        self.push(LogLevel::Warn, msg);
    }
    fn error(&self, msg: &str) {
        self.push(LogLevel::Error, msg);
    }
    fn debug(&self, msg: &str) {
        self.push(LogLevel::Debug, msg);
    }
}
