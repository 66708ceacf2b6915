use chrono::{DateTime, Local};
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S%.3f"), self.message)
    }
}

/// Append-only log pane shared by every fire loop.
///
/// Cloning yields another handle to the same entries. There is no cap on
/// the number of entries; `clear` is the only way to shrink it.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    echo: bool,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that also prints every entry to stdout when it is appended.
    pub fn echoing() -> Self {
        Self {
            entries: Arc::default(),
            echo: true,
        }
    }

    pub fn append(&self, message: impl Into<String>) -> LogEntry {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Local::now();
        // wall clock can step backwards; keep the pane ordered
        let at = match entries.last() {
            Some(last) if last.at > now => last.at,
            _ => now,
        };
        let entry = LogEntry {
            at,
            message: message.into(),
        };
        if self.echo {
            println!("{}", entry);
        }
        entries.push(entry.clone());
        entry
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn render(&self) -> String {
        self.entries()
            .iter()
            .map(LogEntry::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
