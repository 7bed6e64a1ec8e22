//! Descriptive statistics for one column

use statrs::statistics::Statistics;

use super::format::{fixed2, percent2};
use super::{Metric, ResultBundle, RoutineError, RoutineResult, Table, chart, quantile_sorted, sorted};
use crate::data::{Column, Dataset};

pub const TEST_TYPE: &str = "Descriptive statistics";

pub fn descriptive_stats(dataset: &Dataset, variable: &str) -> RoutineResult {
    let column = dataset
        .column(variable)
        .ok_or_else(|| RoutineError::new(format!("Column '{}' not found.", variable)))?;

    if column.present().next().is_none() {
        return Ok(ResultBundle::warning_only(
            TEST_TYPE,
            &[variable],
            format!("Column '{}' has no data after dropping missing values.", variable),
        ));
    }

    let title = format!("Distribution of '{}'", variable);
    if column.is_numeric() {
        Ok(numeric_summary(column, &title))
    } else {
        Ok(categorical_summary(column, &title))
    }
}

fn numeric_summary(column: &Column, title: &str) -> ResultBundle {
    let values = column.numeric_values();
    let ordered = sorted(&values);
    let mean = values.iter().mean();
    let std_dev = values.iter().std_dev();

    let mut bundle = ResultBundle::new(TEST_TYPE, &[column.name()]);
    bundle.metrics = vec![
        Metric::new("Type", "Numeric"),
        Metric::new("Valid count", values.len().to_string()),
        Metric::new("Mean", fixed2(mean)),
        Metric::new("Std. deviation", fixed2(std_dev)),
        Metric::new("Minimum", fixed2(ordered[0])),
        Metric::new("25% quantile", fixed2(quantile_sorted(&ordered, 0.25))),
        Metric::new("Median (50%)", fixed2(quantile_sorted(&ordered, 0.5))),
        Metric::new("75% quantile", fixed2(quantile_sorted(&ordered, 0.75))),
        Metric::new("Maximum", fixed2(ordered[ordered.len() - 1])),
    ];
    bundle.chart = chart::histogram(title, &values);
    bundle
}

fn categorical_summary(column: &Column, title: &str) -> ResultBundle {
    let counts = value_counts(column);
    let valid: usize = counts.iter().map(|(_, n)| n).sum();

    let mut table = Table::new(["Value", "Count", "Percent"]);
    for (value, count) in &counts {
        table.push_row([
            value.clone(),
            count.to_string(),
            percent2(*count as f64 / valid as f64 * 100.0),
        ]);
    }

    let mut bundle = ResultBundle::new(TEST_TYPE, &[column.name()]);
    bundle.metrics = vec![
        Metric::new("Type", "Categorical/Text"),
        Metric::new("Valid count", valid.to_string()),
        Metric::new("Unique values", counts.len().to_string()),
    ];
    bundle.tables.push(table);

    let (labels, frequencies): (Vec<String>, Vec<usize>) = counts.into_iter().unzip();
    bundle.chart = chart::count_bars(title, &labels, &frequencies);
    bundle
}

/// Occurrences per distinct value, most frequent first; ties keep first appearance
pub fn value_counts(column: &Column) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = column
        .distinct()
        .into_iter()
        .map(|value| {
            let n = column.labels().filter(|label| *label == value).count();
            (value, n)
        })
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_numeric_summary() {
        let data = dataset(&["age"], &[&["1"], &["2"], &["3"], &["4"], &[""]]);
        let bundle = descriptive_stats(&data, "age").unwrap();

        assert_eq!(bundle.test_type, TEST_TYPE);
        assert_eq!(bundle.metric("Valid count"), Some("4"));
        assert_eq!(bundle.metric("Mean"), Some("2.50"));
        assert_eq!(bundle.metric("Std. deviation"), Some("1.29"));
        assert_eq!(bundle.metric("Minimum"), Some("1.00"));
        assert_eq!(bundle.metric("25% quantile"), Some("1.75"));
        assert_eq!(bundle.metric("Median (50%)"), Some("2.50"));
        assert_eq!(bundle.metric("75% quantile"), Some("3.25"));
        assert_eq!(bundle.metric("Maximum"), Some("4.00"));
        assert!(bundle.chart.is_some());
        assert!(bundle.warning.is_none());
    }

    #[test]
    fn test_single_value_has_undefined_std() {
        let data = dataset(&["x"], &[&["5"]]);
        let bundle = descriptive_stats(&data, "x").unwrap();
        assert_eq!(bundle.metric("Std. deviation"), Some("n/a"));
    }

    #[test]
    fn test_categorical_summary() {
        let data = dataset(&["arm"], &[&["B"], &["A"], &["A"], &[""], &["C"]]);
        let bundle = descriptive_stats(&data, "arm").unwrap();

        assert_eq!(bundle.metric("Type"), Some("Categorical/Text"));
        assert_eq!(bundle.metric("Valid count"), Some("4"));
        assert_eq!(bundle.metric("Unique values"), Some("3"));

        let table = &bundle.tables[0];
        assert_eq!(table.rows[0], vec!["A", "2", "50.00%"]);
        assert_eq!(table.rows[1], vec!["B", "1", "25.00%"]);
        assert_eq!(table.rows[2], vec!["C", "1", "25.00%"]);
        assert!(bundle.chart.is_some());
    }

    #[test]
    fn test_empty_column_warns() {
        let data = dataset(&["x", "y"], &[&["", "1"], &["", "2"]]);
        let bundle = descriptive_stats(&data, "x").unwrap();
        assert!(bundle.warning.unwrap().contains("no data"));
        assert!(bundle.metrics.is_empty());
        assert!(bundle.chart.is_none());
    }

    #[test]
    fn test_missing_column() {
        let data = dataset(&["x"], &[&["1"]]);
        let err = descriptive_stats(&data, "nope").unwrap_err();
        assert_eq!(err.message, "Column 'nope' not found.");
    }
}
