//! A structured, optional sink for timing and size counters.
//!
//! Every compilation step accepts an `Option<&mut ComputationLog>`; passing `None`
//! never changes what is computed.
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

/// Value of one log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEntry {
    /// A count or size.
    Count(u64),
    /// A duration in seconds.
    Seconds(f64),
    /// Free text, e.g. a verdict.
    Text(String),
    /// A nested group of entries.
    Section(ComputationLog),
}

/// Named entries, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputationLog {
    entries: BTreeMap<String, LogEntry>,
}

impl ComputationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a count.
    pub fn count(&mut self, key: &str, value: usize) {
        self.entries
            .insert(key.to_string(), LogEntry::Count(value as u64));
    }

    /// Records a duration.
    pub fn time(&mut self, key: &str, elapsed: Duration) {
        self.entries
            .insert(key.to_string(), LogEntry::Seconds(elapsed.as_secs_f64()));
    }

    /// Records a text value.
    pub fn text(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(key.to_string(), LogEntry::Text(value.into()));
    }

    /// Returns the nested section with the given name, creating it if necessary.
    /// An existing non-section entry of that name is replaced.
    pub fn section(&mut self, key: &str) -> &mut ComputationLog {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| LogEntry::Section(ComputationLog::new()));
        if !matches!(entry, LogEntry::Section(_)) {
            *entry = LogEntry::Section(ComputationLog::new());
        }
        match entry {
            LogEntry::Section(section) => section,
            _ => unreachable!("entry was replaced by a section"),
        }
    }

    /// Looks up an entry.
    pub fn get(&self, key: &str) -> Option<&LogEntry> {
        self.entries.get(key)
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Helpers for the `Option<&mut ComputationLog>` arguments.
pub(crate) trait LogExt {
    fn count(&mut self, key: &str, value: usize);
    fn time(&mut self, key: &str, elapsed: Duration);
    fn text(&mut self, key: &str, value: impl Into<String>);
}

impl LogExt for Option<&mut ComputationLog> {
    fn count(&mut self, key: &str, value: usize) {
        if let Some(log) = self {
            log.count(key, value);
        }
    }

    fn time(&mut self, key: &str, elapsed: Duration) {
        if let Some(log) = self {
            log.time(key, elapsed);
        }
    }

    fn text(&mut self, key: &str, value: impl Into<String>) {
        if let Some(log) = self {
            log.text(key, value);
        }
    }
}
