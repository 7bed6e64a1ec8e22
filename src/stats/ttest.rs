//! Welch's two-sample t-test (unequal variances)

use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

use super::format::{fixed2, fixed3, format_p_value};
use super::{Metric, ResultBundle, RoutineError, RoutineResult, Table, chart};
use crate::data::{Column, Dataset};

pub const TEST_TYPE: &str = "Welch's t-test (independent samples)";

/// Check that a t-test can run on these columns, returning the two groups
/// in order of first appearance. The first violated condition is reported.
pub fn check_preconditions(
    dataset: &Dataset,
    variable: &str,
    grouping: &str,
) -> std::result::Result<[String; 2], String> {
    prepare(dataset, variable, grouping).map(|(_, _, labels)| labels)
}

fn prepare<'a>(
    dataset: &'a Dataset,
    variable: &str,
    grouping: &str,
) -> std::result::Result<(&'a Column, &'a Column, [String; 2]), String> {
    let measured = dataset
        .column(variable)
        .ok_or_else(|| format!("Column '{}' not found.", variable))?;
    let groups = dataset
        .column(grouping)
        .ok_or_else(|| format!("Column '{}' not found.", grouping))?;

    if !measured.is_numeric() {
        return Err(format!("Column '{}' is not numeric.", variable));
    }

    match <[String; 2]>::try_from(groups.distinct()) {
        Ok(labels) => Ok((measured, groups, labels)),
        Err(labels) => Err(format!(
            "Column '{}' must have 2 groups (found {}: {:?}).",
            grouping,
            labels.len(),
            labels
        )),
    }
}

/// Welch statistic and Welch–Satterthwaite degrees of freedom
pub fn welch_statistic(a: &[f64], b: &[f64]) -> Option<(f64, f64)> {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let v1 = a.iter().variance() / n1;
    let v2 = b.iter().variance() / n2;
    let se2 = v1 + v2;
    if se2.is_nan() || se2 <= 0.0 {
        return None;
    }

    let t = (a.iter().mean() - b.iter().mean()) / se2.sqrt();
    let df = se2 * se2 / (v1 * v1 / (n1 - 1.0) + v2 * v2 / (n2 - 1.0));
    Some((t, df))
}

pub fn welch_t_test(dataset: &Dataset, variable: &str, grouping: &str, alpha: f64) -> RoutineResult {
    let (measured, groups, [first, second]) =
        prepare(dataset, variable, grouping).map_err(RoutineError::new)?;

    let mut samples: [Vec<f64>; 2] = [Vec::new(), Vec::new()];
    for (row, value) in measured.numeric_cells().into_iter().enumerate() {
        let (Some(value), Some(label)) = (value, groups.label(row)) else {
            continue;
        };
        if label == first {
            samples[0].push(value);
        } else if label == second {
            samples[1].push(value);
        }
    }
    let [a, b] = samples;

    if a.is_empty() || b.is_empty() {
        return Ok(ResultBundle::warning_only(
            TEST_TYPE,
            &[variable, grouping],
            format!(
                "One of the t-test groups is empty after dropping missing values in '{}'.",
                variable
            ),
        ));
    }
    if a.len() < 2 || b.len() < 2 {
        return Err(RoutineError::new(format!(
            "Each group needs at least 2 observations (found {} in '{}', {} in '{}').",
            a.len(),
            first,
            b.len(),
            second
        )));
    }

    let (t, df) = welch_statistic(&a, &b).ok_or_else(|| {
        RoutineError::new(format!(
            "The t-test cannot be computed: '{}' does not vary within either group.",
            variable
        ))
    })?;
    let p = StudentsT::new(0.0, 1.0, df)
        .map(|dist| 2.0 * dist.sf(t.abs()))
        .map_err(|e| RoutineError::new(format!("t distribution error: {}", e)))?;

    let mut table = Table::new(["Group", "N", "Mean", "Std. deviation"]);
    for (label, sample) in [(&first, &a), (&second, &b)] {
        table.push_row([
            label.clone(),
            sample.len().to_string(),
            fixed2(sample.iter().mean()),
            fixed2(sample.iter().std_dev()),
        ]);
    }

    let significant = p < alpha;
    let p_text = format_p_value(p);
    let interpretation = if significant {
        format!(
            "Statistically significant difference in '{}' between groups '{}' and '{}' (p={}).",
            variable, first, second, p_text
        )
    } else {
        format!(
            "No statistically significant difference in '{}' between groups '{}' and '{}' (p={}).",
            variable, first, second, p_text
        )
    };

    let mut bundle = ResultBundle::new(TEST_TYPE, &[variable, grouping]);
    bundle.metrics = vec![
        Metric::new("t-statistic", fixed3(t)),
        Metric::new("Degrees of freedom", fixed2(df)),
        Metric::new("p-value", p_text),
    ];
    bundle.tables.push(table);
    bundle.significant = Some(significant);
    bundle.interpretation = Some(interpretation);
    bundle.chart = chart::boxplot(
        &format!("Comparison of '{}' across '{}' groups", variable, grouping),
        &[(first, a), (second, b)],
    );
    Ok(bundle)
}
