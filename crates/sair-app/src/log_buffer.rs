//! Bounded log buffer with pause and filtering
//!
//! Records live in a `VecDeque` used as a ring buffer: appends go to the
//! back and, once `capacity` is exceeded, the oldest records are evicted from
//! the front. The filtered view is computed on read and never touches the
//! stored records.

use std::collections::VecDeque;

use sair_core::LogRecord;

/// Default capacity when no settings are supplied
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct LogBuffer {
    records: VecDeque<LogRecord>,
    capacity: usize,
    paused: bool,
    filter: String,
    /// Lowercased `filter`, cached for matching
    filter_lower: String,
    /// Id given to the most recent record (0 when empty after a clear)
    last_id: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
            paused: false,
            filter: String::new(),
            filter_lower: String::new(),
            last_id: 0,
        }
    }

    /// Append a received line.
    ///
    /// Returns the stored record, or `None` when paused (the line is
    /// discarded, not queued for later).
    pub fn add_line(&mut self, raw: impl Into<String>) -> Option<&LogRecord> {
        if self.paused {
            return None;
        }

        self.last_id += 1;
        self.records.push_back(LogRecord::new(self.last_id, raw));
        self.trim();
        self.records.back()
    }

    /// Remove all records and restart ids at 1.
    ///
    /// Pause state and filter are kept.
    pub fn clear(&mut self) {
        self.records.clear();
        self.last_id = 0;
    }

    /// Flip the pause flag and return the new value
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Replace the filter text. Matching is case-insensitive.
    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.filter = text.into();
        self.filter_lower = self.filter.to_lowercase();
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Whether `record` passes the current filter
    pub fn matches(&self, record: &LogRecord) -> bool {
        record.matches_lowercase(&self.filter_lower)
    }

    /// Records whose text contains the filter, oldest first.
    ///
    /// Returns everything when the filter is empty.
    pub fn filtered_lines(&self) -> Vec<&LogRecord> {
        self.records.iter().filter(|r| self.matches(r)).collect()
    }

    /// All stored records, oldest first
    pub fn records(&self) -> impl ExactSizeIterator<Item = &LogRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, evicting oldest records if it shrank
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.trim();
    }

    fn trim(&mut self) {
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }
}
