//! Diagnostic report compilation.
//!
//! [`compile`] turns one audit pass into an [`AuditReport`]: a timestamped,
//! read-only summary with per-category counts. Every category appears in
//! the counts, zero or not, so consumers see a stable shape.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use duel_types::{DivergenceCategory, DivergenceRecord};
use serde::{Deserialize, Serialize};

/// Aggregated result of one audit pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    timestamp: DateTime<Utc>,
    total_count: usize,
    counts_by_category: BTreeMap<DivergenceCategory, usize>,
    divergences: Vec<DivergenceRecord>,
}

impl AuditReport {
    /// When the report was compiled.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Number of divergences.
    pub const fn total_count(&self) -> usize {
        self.total_count
    }

    /// Divergence count per category, every category present.
    pub const fn counts_by_category(&self) -> &BTreeMap<DivergenceCategory, usize> {
        &self.counts_by_category
    }

    /// Count for a single category.
    pub fn count(&self, category: DivergenceCategory) -> usize {
        self.counts_by_category.get(&category).copied().unwrap_or(0)
    }

    /// The divergences in detection order.
    pub fn divergences(&self) -> &[DivergenceRecord] {
        &self.divergences
    }

    /// Whether the pass found nothing.
    pub const fn is_clean(&self) -> bool {
        self.total_count == 0
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "no divergences");
        }
        write!(f, "{} divergence(s):", self.total_count)?;
        for (category, count) in self.counts_by_category.iter().filter(|(_, c)| **c > 0) {
            write!(f, " {category}={count}")?;
        }
        Ok(())
    }
}

/// Aggregate one pass's divergences into a report.
pub fn compile(divergences: Vec<DivergenceRecord>) -> AuditReport {
    let mut counts_by_category: BTreeMap<DivergenceCategory, usize> =
        DivergenceCategory::ALL.iter().map(|c| (*c, 0)).collect();
    for record in &divergences {
        let count = counts_by_category.entry(record.category()).or_insert(0);
        *count = count.saturating_add(1);
    }

    AuditReport {
        timestamp: Utc::now(),
        total_count: divergences.len(),
        counts_by_category,
        divergences,
    }
}
