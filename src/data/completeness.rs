//! Completeness profiler
//!
//! Per-column missing counts and percentages, the list of eligible columns
//! (missing% < 100) and a one-line summary for the assessment prompt.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::dataset::Dataset;

pub const SUMMARY_NO_ROWS: &str = "The dataset has no data rows.";
pub const SUMMARY_NO_MISSING: &str = "There are no missing values in any column.";
pub const SUMMARY_ALL_OR_NOTHING: &str =
    "Every column is either complete or entirely empty (100% missing).";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCompleteness {
    pub name: String,
    pub missing_count: usize,
    /// In [0, 100]
    pub missing_percent: f64,
}

impl ColumnCompleteness {
    pub fn is_eligible(&self) -> bool {
        self.missing_percent < 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub row_count: usize,
    /// Every column, sorted by missing percentage (descending, stable)
    pub columns: Vec<ColumnCompleteness>,
    /// Columns with missing% < 100, in report order
    pub eligible_columns: Vec<String>,
    pub summary: String,
}

impl CompletenessReport {
    /// Report rows shown to the user (eligible columns only)
    pub fn visible_rows(&self) -> impl Iterator<Item = &ColumnCompleteness> {
        self.columns.iter().filter(|c| c.is_eligible())
    }

    /// True when the dataset has columns but none of them is usable
    pub fn all_columns_empty(&self) -> bool {
        !self.columns.is_empty() && self.eligible_columns.is_empty()
    }

    pub fn is_eligible(&self, column: &str) -> bool {
        self.eligible_columns.iter().any(|c| c == column)
    }
}

/// Profile missing data in every column
pub fn profile(dataset: &Dataset) -> CompletenessReport {
    let row_count = dataset.row_count();

    let mut columns: Vec<ColumnCompleteness> = dataset
        .columns()
        .iter()
        .map(|column| {
            let missing_count = column.missing_count();
            let missing_percent = if row_count == 0 {
                0.0
            } else {
                missing_count as f64 / row_count as f64 * 100.0
            };
            ColumnCompleteness {
                name: column.name().to_string(),
                missing_count,
                missing_percent,
            }
        })
        .collect();

    // sort_by is stable, ties keep dataset order
    columns.sort_by(|a, b| b.missing_percent.total_cmp(&a.missing_percent));

    let eligible_columns: Vec<String> = columns
        .iter()
        .filter(|c| c.is_eligible())
        .map(|c| c.name.clone())
        .collect();

    let summary = summarize(row_count, &columns);

    if !columns.is_empty() && eligible_columns.is_empty() {
        warn!("All {} columns are 100% missing", columns.len());
    }
    info!(
        "Completeness: {} of {} columns eligible",
        eligible_columns.len(),
        columns.len()
    );

    CompletenessReport {
        row_count,
        columns,
        eligible_columns,
        summary,
    }
}

fn summarize(row_count: usize, columns: &[ColumnCompleteness]) -> String {
    if row_count == 0 {
        return SUMMARY_NO_ROWS.to_string();
    }

    if columns.iter().all(|c| c.missing_count == 0) {
        return SUMMARY_NO_MISSING.to_string();
    }

    let partial: Vec<String> = columns
        .iter()
        .filter(|c| c.missing_percent > 0.0 && c.missing_percent < 100.0)
        .map(|c| format!("Column '{}' has {:.1}% missing", c.name, c.missing_percent))
        .collect();

    if partial.is_empty() {
        SUMMARY_ALL_OR_NOTHING.to_string()
    } else {
        format!("{}.", partial.join(". "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dataset(headers: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|c| (!c.is_empty()).then(|| c.to_string()))
                        .collect()
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_percentages_sorted_descending() {
        let ds = dataset(
            &["a", "b", "c"],
            &[&["1", "", ""], &["2", "x", ""], &["3", "", ""], &["4", "y", ""]],
        );
        let report = profile(&ds);

        let names: Vec<&str> = report.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
        assert_eq!(report.columns[0].missing_percent, 100.0);
        assert_eq!(report.columns[1].missing_percent, 50.0);
        assert_eq!(report.eligible_columns, vec!["b", "a"]);
        assert_eq!(report.summary, "Column 'b' has 50.0% missing.");
    }

    #[test]
    fn test_summary_no_missing() {
        let ds = dataset(&["a", "b"], &[&["1", "x"]]);
        assert_eq!(profile(&ds).summary, SUMMARY_NO_MISSING);
    }

    #[test]
    fn test_zero_rows() {
        let ds = dataset(&["a", "b"], &[]);
        let report = profile(&ds);
        assert_eq!(report.summary, SUMMARY_NO_ROWS);
        assert!(report.columns.iter().all(|c| c.missing_percent == 0.0));
        assert_eq!(report.eligible_columns.len(), 2);
    }

    #[test]
    fn test_all_columns_empty() {
        let ds = dataset(&["a", "b"], &[&["", ""], &["", ""]]);
        let report = profile(&ds);
        assert!(report.eligible_columns.is_empty());
        assert!(report.all_columns_empty());
        assert_eq!(report.summary, SUMMARY_ALL_OR_NOTHING);
        assert_eq!(report.columns.len(), 2);
    }

    #[test]
    fn test_one_decimal_in_summary() {
        let ds = dataset(&["a"], &[&[""], &["1"], &["2"]]);
        assert_eq!(profile(&ds).summary, "Column 'a' has 33.3% missing.");
    }

    proptest! {
        #[test]
        fn prop_eligible_iff_below_100(mask in prop::collection::vec(prop::collection::vec(any::<bool>(), 1..6), 0..12)) {
            let width = mask.first().map(|r| r.len()).unwrap_or(3);
            let headers: Vec<String> = (0..width).map(|i| format!("c{}", i)).collect();
            let rows: Vec<Vec<Option<String>>> = mask
                .iter()
                .map(|row| (0..width).map(|i| row.get(i).copied().unwrap_or(false).then(|| "1".to_string())).collect())
                .collect();
            let ds = Dataset::from_rows(headers, rows).unwrap();
            let report = profile(&ds);

            for column in &report.columns {
                prop_assert!((0.0..=100.0).contains(&column.missing_percent));
                prop_assert_eq!(report.is_eligible(&column.name), column.missing_percent < 100.0);
            }
            prop_assert_eq!(report.columns.len(), width);
            for pair in report.columns.windows(2) {
                prop_assert!(pair[0].missing_percent >= pair[1].missing_percent);
            }
        }
    }
}
