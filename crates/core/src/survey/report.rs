use std::collections::BTreeMap;
use std::fmt;

use crate::error::FailureKind;

/// Per-kind counts of item-level failures in a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureReport {
    counts: BTreeMap<FailureKind, usize>,
}

impl FailureReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: FailureKind) {
        self.add(kind, 1);
    }

    pub fn add(&mut self, kind: FailureKind, n: usize) {
        if n > 0 {
            *self.counts.entry(kind).or_insert(0) += n;
        }
    }

    pub fn count(&self, kind: FailureKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: &FailureReport) {
        for (&kind, &n) in &other.counts {
            self.add(kind, n);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FailureKind, usize)> + '_ {
        self.counts.iter().map(|(&k, &n)| (k, n))
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return f.write_str("no failures");
        }
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(kind, n)| format!("{}: {}", kind, n))
            .collect();
        f.write_str(&parts.join(", "))
    }
}
