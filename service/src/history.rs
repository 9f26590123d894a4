use std::collections::VecDeque;

/// How many recently analysed sources are remembered
pub const MAX_HISTORY_SIZE: usize = 10;

/// Recently analysed log sources, oldest first.
#[derive(Debug, Clone)]
pub struct RecentSources {
    entries: VecDeque<String>,
    capacity: usize,
}

impl RecentSources {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Remember a source. Already known sources keep their position;
    /// past capacity the oldest entry is dropped.
    pub fn add(&mut self, source: &str) {
        if self.entries.iter().any(|s| s == source) {
            return;
        }

        self.entries.push_back(source.to_string());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for RecentSources {
    fn default() -> Self {
        Self::new(MAX_HISTORY_SIZE)
    }
}
