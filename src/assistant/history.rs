// ABOUTME: In-session history of executed assistant queries
// ABOUTME: Keeps every entry and lists the most recent ones newest first

/// Number of entries shown by [`QueryHistory::recent`]
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// 1-based position in the session
    pub number: usize,
    pub question: String,
    pub sql: String,
    pub rows: usize,
}

impl HistoryEntry {
    /// Question shortened for one-line listings
    pub fn title(&self) -> String {
        const MAX_CHARS: usize = 60;
        if self.question.chars().count() <= MAX_CHARS {
            self.question.clone()
        } else {
            let head: String = self.question.chars().take(MAX_CHARS).collect();
            format!("{}...", head)
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryHistory {
    entries: Vec<HistoryEntry>,
}

impl QueryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, question: &str, sql: &str, rows: usize) {
        let number = self.entries.len() + 1;
        self.entries.push(HistoryEntry {
            number,
            question: question.to_string(),
            sql: sql.to_string(),
            rows,
        });
    }

    /// Up to [`RECENT_LIMIT`] entries, newest first
    pub fn recent(&self) -> Vec<&HistoryEntry> {
        self.entries.iter().rev().take(RECENT_LIMIT).collect()
    }

    /// Look up an entry by its session number
    pub fn get(&self, number: usize) -> Option<&HistoryEntry> {
        number
            .checked_sub(1)
            .and_then(|idx| self.entries.get(idx))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
