//! SVG chart rendering.
//!
//! Every renderer returns `None` when there is nothing to draw or drawing
//! fails; failures are logged and never leave this module.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use plotters::prelude::*;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

use super::{quantile_sorted, sorted};
use crate::constants::chart::{DATA_URI_PREFIX, HEIGHT, MAX_CATEGORIES, MAX_HISTOGRAM_BINS, WIDTH};

type DrawResult = std::result::Result<String, Box<dyn Error>>;

fn caption_font() -> FontDesc<'static> {
    ("sans-serif", 18).into_font()
}

fn render(kind: &str, draw: impl FnOnce() -> DrawResult) -> Option<String> {
    match panic::catch_unwind(AssertUnwindSafe(draw)) {
        Ok(Ok(svg)) => Some(to_data_uri(&svg)),
        Ok(Err(e)) => {
            warn!("Could not render {} chart: {}", kind, e);
            None
        }
        Err(_) => {
            warn!("{} chart renderer panicked", kind);
            None
        }
    }
}

pub fn to_data_uri(svg: &str) -> String {
    format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(svg.as_bytes()))
}

/// Label shown under integer ticks of a categorical f64 axis
fn category_label(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

/// Histogram of a numeric column
pub fn histogram(title: &str, values: &[f64]) -> Option<String> {
    if values.is_empty() {
        return None;
    }

    render("histogram", || {
        let bins = ((values.len() as f64).sqrt().ceil() as usize).clamp(1, MAX_HISTOGRAM_BINS);
        let (mut lo, mut hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;

        let mut counts = vec![0usize; bins];
        for &v in values {
            let index = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[index] += 1;
        }
        let peak = counts.iter().copied().max().unwrap_or(1) as f64;

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
            root.fill(&WHITE)?;
            let mut chart = ChartBuilder::on(&root)
                .caption(title, caption_font())
                .margin(12)
                .x_label_area_size(36)
                .y_label_area_size(48)
                .build_cartesian_2d(lo..hi, 0.0..peak * 1.1)?;
            chart
                .configure_mesh()
                .disable_x_mesh()
                .y_desc("Frequency")
                .draw()?;
            chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
                let x0 = lo + i as f64 * width;
                Rectangle::new([(x0, 0.0), (x0 + width, count as f64)], BLUE.mix(0.6).filled())
            }))?;
            root.present()?;
        }
        Ok(svg)
    })
}

/// Bars for value counts; `labels` and `counts` are parallel
pub fn count_bars(title: &str, labels: &[String], counts: &[usize]) -> Option<String> {
    let n = labels.len().min(counts.len()).min(MAX_CATEGORIES);
    if n == 0 || counts[..n].iter().all(|&c| c == 0) {
        return None;
    }
    let labels = &labels[..n];
    let counts = &counts[..n];

    render("count", || {
        let peak = counts.iter().copied().max().unwrap_or(1) as f64;
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
            root.fill(&WHITE)?;
            let mut chart = ChartBuilder::on(&root)
                .caption(title, caption_font())
                .margin(12)
                .x_label_area_size(48)
                .y_label_area_size(48)
                .build_cartesian_2d(-0.5..n as f64 - 0.5, 0.0..peak * 1.1)?;
            let formatter = |x: &f64| category_label(labels, *x);
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(n)
                .x_label_formatter(&formatter)
                .y_desc("Count")
                .draw()?;
            chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
                let x = i as f64;
                Rectangle::new([(x - 0.35, 0.0), (x + 0.35, count as f64)], BLUE.mix(0.6).filled())
            }))?;
            root.present()?;
        }
        Ok(svg)
    })
}

/// Clustered bars: one cluster per x label, one bar per series
pub fn grouped_bars(title: &str, x_labels: &[String], series: &[(String, Vec<usize>)]) -> Option<String> {
    let n = x_labels.len().min(MAX_CATEGORIES);
    let peak = series
        .iter()
        .flat_map(|(_, counts)| counts.iter().copied())
        .max()
        .unwrap_or(0);
    if n == 0 || series.is_empty() || peak == 0 {
        return None;
    }
    let x_labels = &x_labels[..n];

    render("grouped bar", || {
        let slot = 0.8 / series.len() as f64;
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
            root.fill(&WHITE)?;
            let mut chart = ChartBuilder::on(&root)
                .caption(title, caption_font())
                .margin(12)
                .x_label_area_size(48)
                .y_label_area_size(48)
                .build_cartesian_2d(-0.5..n as f64 - 0.5, 0.0..peak as f64 * 1.15)?;
            let formatter = |x: &f64| category_label(x_labels, *x);
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(n)
                .x_label_formatter(&formatter)
                .y_desc("Count")
                .draw()?;

            for (j, (name, counts)) in series.iter().enumerate() {
                let color = Palette99::pick(j).to_rgba();
                chart
                    .draw_series(counts.iter().take(n).enumerate().map(|(i, &count)| {
                        let x0 = i as f64 - 0.4 + j as f64 * slot;
                        Rectangle::new([(x0, 0.0), (x0 + slot, count as f64)], color.mix(0.8).filled())
                    }))?
                    .label(name.as_str())
                    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
            }

            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
            root.present()?;
        }
        Ok(svg)
    })
}

/// Side-by-side box plots, whiskers at 1.5 IQR
pub fn boxplot(title: &str, groups: &[(String, Vec<f64>)]) -> Option<String> {
    if groups.is_empty() || groups.iter().all(|(_, values)| values.is_empty()) {
        return None;
    }

    render("box plot", || {
        let labels: Vec<String> = groups.iter().map(|(name, _)| name.clone()).collect();
        let (lo, hi) = groups
            .iter()
            .flat_map(|(_, values)| values.iter().copied())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let pad = if hi > lo { (hi - lo) * 0.08 } else { 1.0 };
        let n = groups.len();

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
            root.fill(&WHITE)?;
            let mut chart = ChartBuilder::on(&root)
                .caption(title, caption_font())
                .margin(12)
                .x_label_area_size(40)
                .y_label_area_size(56)
                .build_cartesian_2d(-0.5..n as f64 - 0.5, lo - pad..hi + pad)?;
            let formatter = |x: &f64| category_label(&labels, *x);
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(n)
                .x_label_formatter(&formatter)
                .draw()?;

            for (i, (_, values)) in groups.iter().enumerate() {
                if values.is_empty() {
                    continue;
                }
                let x = i as f64;
                let ordered = sorted(values);
                let q1 = quantile_sorted(&ordered, 0.25);
                let median = quantile_sorted(&ordered, 0.5);
                let q3 = quantile_sorted(&ordered, 0.75);
                let fence = 1.5 * (q3 - q1);
                let low_whisker = ordered
                    .iter()
                    .copied()
                    .find(|&v| v >= q1 - fence)
                    .unwrap_or(q1);
                let high_whisker = ordered
                    .iter()
                    .rev()
                    .copied()
                    .find(|&v| v <= q3 + fence)
                    .unwrap_or(q3);
                let color = Palette99::pick(i).to_rgba();

                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.25, q1), (x + 0.25, q3)],
                    color.mix(0.5).filled(),
                )))?;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.25, q1), (x + 0.25, q3)],
                    BLACK.stroke_width(1),
                )))?;
                chart.draw_series(
                    [
                        vec![(x - 0.25, median), (x + 0.25, median)],
                        vec![(x, q1), (x, low_whisker)],
                        vec![(x, q3), (x, high_whisker)],
                        vec![(x - 0.1, low_whisker), (x + 0.1, low_whisker)],
                        vec![(x - 0.1, high_whisker), (x + 0.1, high_whisker)],
                    ]
                    .into_iter()
                    .map(|points| PathElement::new(points, BLACK.stroke_width(2))),
                )?;
                chart.draw_series(
                    ordered
                        .iter()
                        .filter(|&&v| v < low_whisker || v > high_whisker)
                        .map(|&v| Circle::new((x, v), 3, RED.filled())),
                )?;
            }
            root.present()?;
        }
        Ok(svg)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(uri: &str) -> String {
        let payload = uri.strip_prefix(DATA_URI_PREFIX).unwrap();
        String::from_utf8(STANDARD.decode(payload).unwrap()).unwrap()
    }

    #[test]
    fn test_histogram_payload() {
        let uri = histogram("Distribution of age", &[1.0, 2.0, 2.5, 3.0, 10.0]).unwrap();
        assert!(uri.starts_with(DATA_URI_PREFIX));
        assert!(decode(&uri).contains("<svg"));
    }

    #[test]
    fn test_histogram_constant_values() {
        assert!(histogram("x", &[4.0, 4.0, 4.0]).is_some());
    }

    #[test]
    fn test_no_data_no_payload() {
        assert!(histogram("x", &[]).is_none());
        assert!(count_bars("x", &[], &[]).is_none());
        assert!(grouped_bars("x", &["a".into()], &[("b".into(), vec![0])]).is_none());
        assert!(boxplot("x", &[("a".into(), vec![]), ("b".into(), vec![])]).is_none());
    }

    #[test]
    fn test_count_and_grouped_bars() {
        let labels = vec!["yes".to_string(), "no".to_string()];
        assert!(count_bars("Answers", &labels, &[3, 1]).is_some());
        let series = vec![("A".to_string(), vec![2, 1]), ("B".to_string(), vec![0, 4])];
        let uri = grouped_bars("Answers by arm", &labels, &series).unwrap();
        assert!(decode(&uri).contains("<svg"));
    }

    #[test]
    fn test_boxplot() {
        let groups = vec![
            ("A".to_string(), vec![1.0, 2.0, 3.0, 4.0, 40.0]),
            ("B".to_string(), vec![2.0, 3.0, 3.5]),
        ];
        assert!(boxplot("Score by arm", &groups).is_some());
    }

    #[test]
    fn test_category_label() {
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(category_label(&labels, 1.0), "b");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, 5.0), "");
        assert_eq!(category_label(&labels, -1.0), "");
    }
}
