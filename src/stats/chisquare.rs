//! Pearson's chi-square test of independence

use statrs::distribution::{ChiSquared, ContinuousCDF};

use super::format::{fixed2, fixed3, format_p_value};
use super::{Metric, ResultBundle, RoutineError, RoutineResult, Table, chart};
use crate::constants::stats::MIN_EXPECTED_FREQUENCY;
use crate::data::{Column, Dataset, parse_number};

pub const TEST_TYPE: &str = "Pearson's chi-square test";

/// Columns are different and both exist; identical names are rejected first
pub fn check_preconditions(dataset: &Dataset, first: &str, second: &str) -> std::result::Result<(), String> {
    if first == second {
        return Err("Two different columns required.".to_string());
    }
    for name in [first, second] {
        if !dataset.has_column(name) {
            return Err(format!("Column '{}' not found.", name));
        }
    }
    Ok(())
}

/// Cross-tabulation of two columns over rows where both are present
#[derive(Debug, Clone, PartialEq)]
pub struct Contingency {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl Contingency {
    pub fn build(rows: &Column, cols: &Column) -> Self {
        let row_labels = sorted_labels(rows);
        let col_labels = sorted_labels(cols);
        let mut counts = vec![vec![0usize; col_labels.len()]; row_labels.len()];

        for index in 0..rows.len().min(cols.len()) {
            let (Some(r), Some(c)) = (rows.label(index), cols.label(index)) else {
                continue;
            };
            let i = row_labels.iter().position(|l| *l == r);
            let j = col_labels.iter().position(|l| *l == c);
            if let (Some(i), Some(j)) = (i, j) {
                counts[i][j] += 1;
            }
        }

        // A label seen only alongside missing partners has no place in the table
        let keep_rows: Vec<bool> = counts.iter().map(|row| row.iter().any(|&n| n > 0)).collect();
        let keep_cols: Vec<bool> = (0..col_labels.len())
            .map(|j| counts.iter().any(|row| row[j] > 0))
            .collect();

        let filter = |labels: Vec<String>, keep: &[bool]| -> Vec<String> {
            labels
                .into_iter()
                .zip(keep)
                .filter_map(|(label, &k)| k.then_some(label))
                .collect()
        };
        let counts = counts
            .into_iter()
            .zip(&keep_rows)
            .filter(|(_, k)| **k)
            .map(|(row, _)| {
                row.into_iter()
                    .zip(&keep_cols)
                    .filter_map(|(n, &k)| k.then_some(n))
                    .collect()
            })
            .collect();

        Self {
            row_labels: filter(row_labels, &keep_rows),
            col_labels: filter(col_labels, &keep_cols),
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn row_sums(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn col_sums(&self) -> Vec<usize> {
        (0..self.col_labels.len())
            .map(|j| self.counts.iter().map(|row| row[j]).sum())
            .collect()
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.row_labels.len().saturating_sub(1) * self.col_labels.len().saturating_sub(1)
    }

    pub fn expected(&self) -> Vec<Vec<f64>> {
        let total = self.total() as f64;
        let col_sums = self.col_sums();
        self.row_sums()
            .into_iter()
            .map(|r| {
                col_sums
                    .iter()
                    .map(|&c| r as f64 * c as f64 / total)
                    .collect()
            })
            .collect()
    }

    fn to_table(&self, corner: &str) -> Table {
        let mut table = Table::new(
            std::iter::once(corner.to_string()).chain(self.col_labels.iter().cloned()),
        )
        .titled("Contingency table");
        for (label, row) in self.row_labels.iter().zip(&self.counts) {
            table.push_row(std::iter::once(label.clone()).chain(row.iter().map(|n| n.to_string())));
        }
        table
    }
}

/// Distinct labels, numerically ordered for numeric columns and lexically otherwise
fn sorted_labels(column: &Column) -> Vec<String> {
    let mut labels = column.distinct();
    if column.is_numeric() {
        labels.sort_by(|a, b| {
            let a = parse_number(a).unwrap_or(f64::NAN);
            let b = parse_number(b).unwrap_or(f64::NAN);
            a.total_cmp(&b)
        });
    } else {
        labels.sort();
    }
    labels
}

/// Chi-square statistic; Yates' continuity correction applies at one degree of freedom
pub fn chi_square_statistic(observed: &[Vec<usize>], expected: &[Vec<f64>], dof: usize) -> f64 {
    observed
        .iter()
        .flatten()
        .zip(expected.iter().flatten())
        .map(|(&o, &e)| {
            let o = o as f64;
            let diff = if dof == 1 {
                ((o - e).abs() - 0.5).max(0.0)
            } else {
                o - e
            };
            diff * diff / e
        })
        .sum()
}

pub fn chi_square(dataset: &Dataset, first: &str, second: &str, alpha: f64) -> RoutineResult {
    check_preconditions(dataset, first, second).map_err(RoutineError::new)?;
    let (Some(rows), Some(cols)) = (dataset.column(first), dataset.column(second)) else {
        return Err(RoutineError::new(format!("Column '{}' not found.", first)));
    };

    let contingency = Contingency::build(rows, cols);
    if contingency.total() == 0 {
        return Ok(ResultBundle::warning_only(
            TEST_TYPE,
            &[first, second],
            format!(
                "The contingency table for '{}' and '{}' is empty or contains only zeros.",
                first, second
            ),
        ));
    }

    let mut bundle = ResultBundle::new(TEST_TYPE, &[first, second]);
    bundle.tables.push(contingency.to_table(&format!("{} \\ {}", first, second)));

    let dof = contingency.degrees_of_freedom();
    if dof == 0 {
        return Err(RoutineError::with_partial(
            format!(
                "Chi-square cannot be computed: the contingency table needs at least 2 rows and 2 columns (got {}x{}).",
                contingency.row_labels.len(),
                contingency.col_labels.len()
            ),
            bundle,
        ));
    }

    let expected = contingency.expected();
    let statistic = chi_square_statistic(&contingency.counts, &expected, dof);
    let p = ChiSquared::new(dof as f64)
        .map(|dist| dist.sf(statistic))
        .map_err(|e| RoutineError::with_partial(format!("chi-square distribution error: {}", e), bundle.clone()))?;

    let min_expected = expected.iter().flatten().copied().fold(f64::INFINITY, f64::min);
    if min_expected < MIN_EXPECTED_FREQUENCY {
        bundle.warning = Some(format!(
            "Minimum expected frequency ({}) < 5. Chi-square results may be inaccurate.",
            fixed2(min_expected)
        ));
    }

    let mut expected_table = Table::new(
        std::iter::once(String::new()).chain(contingency.col_labels.iter().cloned()),
    )
    .titled("Expected frequencies");
    for (label, row) in contingency.row_labels.iter().zip(&expected) {
        expected_table.push_row(std::iter::once(label.clone()).chain(row.iter().map(|&e| fixed2(e))));
    }
    bundle.tables.push(expected_table);

    let significant = p < alpha;
    let p_text = format_p_value(p);
    bundle.metrics = vec![
        Metric::new("Chi-square", fixed3(statistic)),
        Metric::new("Degrees of freedom", dof.to_string()),
        Metric::new("p-value", p_text.clone()),
    ];
    bundle.significant = Some(significant);
    bundle.interpretation = Some(if significant {
        format!(
            "Statistically significant association between '{}' and '{}' (p={}).",
            first, second, p_text
        )
    } else {
        format!(
            "No statistically significant association between '{}' and '{}' (p={}).",
            first, second, p_text
        )
    });

    let series: Vec<(String, Vec<usize>)> = contingency
        .col_labels
        .iter()
        .enumerate()
        .map(|(j, label)| (label.clone(), contingency.counts.iter().map(|row| row[j]).collect()))
        .collect();
    bundle.chart = chart::grouped_bars(
        &format!("Association between '{}' and '{}'", first, second),
        &contingency.row_labels,
        &series,
    );

    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(pairs: &[(&str, &str, usize)]) -> Dataset {
        let mut rows = Vec::new();
        for &(a, b, n) in pairs {
            for _ in 0..n {
                rows.push(vec![
                    (!a.is_empty()).then(|| a.to_string()),
                    (!b.is_empty()).then(|| b.to_string()),
                ]);
            }
        }
        Dataset::from_rows(vec!["sex".into(), "answer".into()], rows).unwrap()
    }

    #[test]
    fn test_two_by_two_with_yates() {
        let data = pairs(&[("M", "yes", 20), ("M", "no", 10), ("F", "yes", 10), ("F", "no", 20)]);
        let bundle = chi_square(&data, "sex", "answer", 0.05).unwrap();

        // Expected 15 everywhere; corrected |o - e| = 4.5, statistic = 4 * 4.5^2 / 15
        assert_eq!(bundle.metric("Chi-square"), Some("5.400"));
        assert_eq!(bundle.metric("Degrees of freedom"), Some("1"));
        assert_eq!(bundle.metric("p-value"), Some("0.020"));
        assert_eq!(bundle.significant, Some(true));
        assert!(bundle.warning.is_none());
        assert!(bundle.chart.is_some());

        let table = &bundle.tables[0];
        assert_eq!(table.headers, vec!["sex \\ answer", "no", "yes"]);
        assert_eq!(table.rows[0], vec!["F", "20", "10"]);
        assert_eq!(table.rows[1], vec!["M", "10", "20"]);
    }

    #[test]
    fn test_no_correction_above_one_dof() {
        let observed = vec![vec![10, 20, 30], vec![30, 20, 10]];
        let expected = vec![vec![20.0, 20.0, 20.0], vec![20.0, 20.0, 20.0]];
        let statistic = chi_square_statistic(&observed, &expected, 2);
        assert!((statistic - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_expected_warns_but_keeps_result() {
        let data = pairs(&[("M", "yes", 1), ("M", "no", 2), ("F", "yes", 3), ("F", "no", 1)]);
        let bundle = chi_square(&data, "sex", "answer", 0.05).unwrap();
        let warning = bundle.warning.unwrap();
        assert!(warning.starts_with("Minimum expected frequency ("));
        assert!(warning.ends_with("< 5. Chi-square results may be inaccurate."));
        assert!(bundle.significant.is_some());
    }

    #[test]
    fn test_missing_pairs_are_dropped() {
        let data = pairs(&[("M", "yes", 2), ("F", "", 3), ("", "no", 1), ("F", "no", 2)]);
        let rows = data.column("sex").unwrap();
        let cols = data.column("answer").unwrap();
        let contingency = Contingency::build(rows, cols);
        assert_eq!(contingency.total(), 4);
        assert_eq!(contingency.counts, vec![vec![2, 0], vec![0, 2]]);
    }

    #[test]
    fn test_single_category_returns_table_with_error() {
        let data = pairs(&[("M", "yes", 3), ("F", "yes", 2)]);
        let err = chi_square(&data, "sex", "answer", 0.05).unwrap_err();
        assert!(err.message.contains("at least 2 rows and 2 columns"));
        let partial = err.partial.unwrap();
        assert_eq!(partial.tables[0].rows.len(), 2);
    }

    #[test]
    fn test_labels_without_partners_are_pruned() {
        let data = pairs(&[("M", "yes", 2), ("F", "no", 1), ("X", "", 2), ("", "maybe", 1)]);
        let contingency = Contingency::build(data.column("sex").unwrap(), data.column("answer").unwrap());
        assert_eq!(contingency.row_labels, vec!["F", "M"]);
        assert_eq!(contingency.col_labels, vec!["no", "yes"]);
        assert!(!contingency.row_sums().contains(&0));
        assert!(!contingency.col_sums().contains(&0));
    }

    #[test]
    fn test_all_missing_warns() {
        let data = pairs(&[("M", "", 2), ("", "yes", 2)]);
        let bundle = chi_square(&data, "sex", "answer", 0.05).unwrap();
        assert!(bundle.warning.unwrap().contains("empty or contains only zeros"));
    }

    #[test]
    fn test_preconditions() {
        let data = pairs(&[("M", "yes", 1)]);
        assert_eq!(
            check_preconditions(&data, "sex", "sex").unwrap_err(),
            "Two different columns required."
        );
        assert_eq!(
            check_preconditions(&data, "sex", "ghost").unwrap_err(),
            "Column 'ghost' not found."
        );
        assert_eq!(
            check_preconditions(&data, "ghost", "ghost").unwrap_err(),
            "Two different columns required."
        );
    }

    #[test]
    fn test_numeric_labels_sort_numerically() {
        let data = Dataset::from_rows(
            vec!["dose".into(), "arm".into()],
            vec![
                vec![Some("10".into()), Some("a".into())],
                vec![Some("9".into()), Some("b".into())],
            ],
        )
        .unwrap();
        assert_eq!(sorted_labels(data.column("dose").unwrap()), vec!["9", "10"]);
    }
}
