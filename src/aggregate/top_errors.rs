//! Most-frequent-message counter for `errors top`.

use std::collections::HashMap;

/// Per-severity, per-message counters.
#[derive(Debug, Default)]
pub struct TopErrors {
    counts: HashMap<(String, String), u64>,
    pub total: u64,
}

/// One ranked entry of the read-out.
#[derive(Debug, Clone, PartialEq)]
pub struct TopError {
    pub severity: String,
    pub message: String,
    pub count: u64,
}

impl TopErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, severity: &str, message: &str) {
        *self
            .counts
            .entry((severity.to_string(), message.to_string()))
            .or_insert(0) += 1;
        self.total += 1;
    }

    /// The `n` most frequent (severity, message) pairs, count descending.
    pub fn top_n(&self, n: usize) -> Vec<TopError> {
        let mut entries: Vec<TopError> = self
            .counts
            .iter()
            .map(|((severity, message), count)| TopError {
                severity: severity.clone(),
                message: message.clone(),
                count: *count,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.severity.cmp(&b.severity))
                .then(a.message.cmp(&b.message))
        });
        entries.truncate(n);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_n_ordering() {
        let mut top = TopErrors::new();
        for _ in 0..3 {
            top.add("ERROR", "division by zero");
        }
        top.add("ERROR", "relation does not exist");
        top.add("WARNING", "long transaction");
        top.add("WARNING", "long transaction");

        let entries = top.top_n(2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "division by zero");
        assert_eq!(entries[0].count, 3);
        assert_eq!(entries[1].message, "long transaction");
        assert_eq!(top.total, 6);
    }

    #[test]
    fn test_top_n_larger_than_entries() {
        let mut top = TopErrors::new();
        top.add("ERROR", "boom");
        assert_eq!(top.top_n(10).len(), 1);
    }
}
