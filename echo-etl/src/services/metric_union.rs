//! Union of indicator, data-element and target rows
//!
//! The same metric can come back from two different source groupings, so
//! exact duplicates (every column equal) are removed here, once, after
//! concatenation. Indicator rows have no disaggregation column; they carry
//! the explicit `None` marker instead.

use crate::models::MetricRow;
use std::collections::HashSet;
use tracing::info;

/// Concatenate indicator → data element → target rows and drop exact
/// duplicates, keeping the first occurrence
pub fn union(
    indicator_rows: Vec<MetricRow>,
    data_element_rows: Vec<MetricRow>,
    target_rows: Vec<MetricRow>,
) -> Vec<MetricRow> {
    let total = indicator_rows.len() + data_element_rows.len() + target_rows.len();
    let mut seen: HashSet<MetricRow> = HashSet::with_capacity(total);
    let mut merged = Vec::with_capacity(total);

    let inputs = indicator_rows
        .into_iter()
        .map(without_disaggregation)
        .chain(data_element_rows)
        .chain(target_rows);

    for row in inputs {
        if !seen.contains(&row) {
            seen.insert(row.clone());
            merged.push(row);
        }
    }

    info!(
        input = total,
        output = merged.len(),
        duplicates = total - merged.len(),
        "Metric sources merged"
    );

    merged
}

/// Indicator payloads never carry a category option combo; normalize any
/// stray value to the marker so all indicator rows share one shape
fn without_disaggregation(row: MetricRow) -> MetricRow {
    MetricRow {
        category_option_combo: None,
        ..row
    }
}
