use ndarray::{s, ArrayView2, Axis};
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;

use crate::error::{invalid, DiagError, Result};

pub const DEFAULT_RESOURCE_LABELS: [&str; 3] = ["Proposal", "Likelihood", "Implement"];

const PIE_COLORS: [RGBColor; 3] = [RGBColor(31, 119, 180), RGBColor(255, 127, 14), RGBColor(44, 160, 44)];

/// Total time spent per stage, summed over samples (`[sample, stage]`).
/// With `nsamp` set only the first `nsamp` samples count.
pub fn resource_totals(timestats: ArrayView2<'_, f64>, nsamp: Option<usize>) -> Result<Vec<f64>> {
    let nsamp = nsamp.unwrap_or(timestats.nrows());
    if nsamp == 0 {
        return invalid("no timing samples");
    }
    if nsamp > timestats.nrows() {
        return invalid(format!(
            "requested {} timing samples but only {} were recorded",
            nsamp,
            timestats.nrows()
        ));
    }
    let used = timestats.slice(s![..nsamp, ..]);
    if used.iter().any(|t| !t.is_finite() || *t < 0.0) {
        return invalid("timings must be finite and non-negative");
    }
    Ok(used.sum_axis(Axis(0)).to_vec())
}

/// Pie chart of where sampler time went, labelled with percentages.
pub fn plot_comp_resources<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    timestats: ArrayView2<'_, f64>,
    nsamp: Option<usize>,
    labels: &[&str],
) -> Result<Vec<f64>> {
    if labels.len() != timestats.ncols() {
        return Err(DiagError::ShapeMismatch(format!(
            "{} labels for {} timing columns",
            labels.len(),
            timestats.ncols()
        )));
    }
    let totals = resource_totals(timestats, nsamp)?;
    if totals.iter().sum::<f64>() <= 0.0 {
        return invalid("total time is zero");
    }

    let area = area.titled("Computational Resources", ("sans-serif", 20))?;
    let (w, h) = area.dim_in_pixel();
    let center = ((w / 2) as i32, (h / 2) as i32);
    let radius = 0.35 * w.min(h) as f64;
    let colors: Vec<RGBColor> = (0..totals.len()).map(|i| PIE_COLORS[i % PIE_COLORS.len()]).collect();

    let mut pie = Pie::new(&center, &radius, &totals, &colors, labels);
    pie.start_angle(90.0);
    pie.label_style(("sans-serif", 16).into_font().color(&BLACK));
    pie.percentages(("sans-serif", 14).into_font().color(&WHITE));
    area.draw(&pie)?;
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn totals_sum_over_samples() {
        let stats = array![[1.0, 2.0, 0.5], [3.0, 0.0, 0.5]];
        assert_eq!(resource_totals(stats.view(), None).unwrap(), vec![4.0, 2.0, 1.0]);
    }

    #[test]
    fn sample_limit_counts_leading_rows_only() {
        let stats = array![[1.0, 2.0, 0.5], [3.0, 0.0, 0.5], [f64::NAN, 9.0, 9.0]];
        assert_eq!(resource_totals(stats.view(), Some(1)).unwrap(), vec![1.0, 2.0, 0.5]);
        assert_eq!(resource_totals(stats.view(), Some(2)).unwrap(), vec![4.0, 2.0, 1.0]);
        assert!(resource_totals(stats.view(), Some(4)).is_err());
        assert!(resource_totals(stats.view(), Some(0)).is_err());
    }

    #[test]
    fn negative_timings_are_rejected() {
        let stats = array![[1.0, -2.0, 0.5]];
        assert!(resource_totals(stats.view(), None).is_err());
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn pie_renders_svg() {
        let stats = array![[1.0, 2.0, 0.5], [3.0, 0.0, 0.5], [2.0, 2.0, 2.0]];
        let mut totals = Vec::new();
        let svg = crate::plot::render_svg(crate::plot::FIGURE_SIZE, |area| {
            totals = plot_comp_resources(area, stats.view(), Some(2), &DEFAULT_RESOURCE_LABELS)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(totals, vec![4.0, 2.0, 1.0]);
        assert!(svg.contains("Computational Resources"));
        assert!(svg.contains("Likelihood"));
    }
}
