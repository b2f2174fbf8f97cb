//! Per-item results for batch work (channels, attachments, messages).
//!
//! Batch steps keep going when one item fails; instead of only logging, each
//! item reports an [`ItemOutcome`] and the caller gets a [`BatchReport`] it can
//! render back to the user.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq)]
pub enum ItemOutcome<T> {
    Succeeded(T),
    Failed { item: String, error: String },
}

impl<T> ItemOutcome<T> {
    pub fn failed(item: impl Into<String>, error: impl ToString) -> Self {
        Self::Failed { item: item.into(), error: error.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemNote {
    pub item: String,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<ItemNote>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self { succeeded: Vec::new(), failed: Vec::new() }
    }
}

impl<T> BatchReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: ItemOutcome<T>) {
        match outcome {
            ItemOutcome::Succeeded(value) => self.succeeded.push(value),
            ItemOutcome::Failed { item, error } => {
                self.failed.push(ItemNote { item, detail: error })
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// One line per failed item, suitable for a chat reply.
    pub fn failure_lines(&self) -> Vec<String> {
        self.failed.iter().map(|note| format!("{}: {}", note.item, note.detail)).collect()
    }
}

impl<T> FromIterator<ItemOutcome<T>> for BatchReport<T> {
    fn from_iter<I: IntoIterator<Item = ItemOutcome<T>>>(iter: I) -> Self {
        let mut report = Self::new();
        for outcome in iter {
            report.record(outcome);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchReport, ItemOutcome};

    #[test]
    fn report_separates_outcomes_and_keeps_order() {
        let report: BatchReport<u32> = vec![
            ItemOutcome::Succeeded(1),
            ItemOutcome::failed("ts=10", "model timeout"),
            ItemOutcome::Succeeded(2),
        ]
        .into_iter()
        .collect();

        assert_eq!(report.succeeded, vec![1, 2]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.total(), 3);
        assert!(!report.is_clean());
        assert_eq!(report.failure_lines(), vec!["ts=10: model timeout".to_string()]);
    }
}
