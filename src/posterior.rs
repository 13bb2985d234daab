//! Posterior histograms and number-count summaries.

use log::debug;
use ndarray::{ArrayView2, ArrayViewD, Axis};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;

use crate::error::{invalid, DiagError, Result};
use crate::plot::{draw_step_histograms, StepHist, VLine};
use crate::stats::{column_summary, density, equal_width_edges, histogram, linspace, median, scotts_rule_bins, ColumnSummary};

pub const SRC_NUMBER_BINS: usize = 15;
pub const FLUX_DIST_YLIM: (f64, f64) = (5e-1, 5e2);
pub const NUMBER_COUNTS_YLIM: (f64, f64) = (1e-1, 1e5);
/// Flux-ratio bin edges of the color posterior, `linspace(0.01, 5, 50)`.
pub const COLOR_EDGES: (f64, f64, usize) = (0.01, 5.0, 50);

#[derive(Debug, Clone, Serialize)]
pub struct HistogramSummary {
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

fn step_histogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    samples: &[f64],
    caption: Option<&str>,
    band: &str,
) -> Result<HistogramSummary> {
    let edges = scotts_rule_bins(samples)?;
    let counts = histogram(samples, &edges)?;
    debug!("{} Scott's-rule bins for {}", edges.len() - 1, band);
    draw_step_histograms(
        area,
        caption,
        "Amplitude [Jy/beam]",
        "N_samp",
        &[StepHist {
            label: Some(band.to_string()),
            edges: edges.clone(),
            heights: counts.iter().map(|c| *c as f64).collect(),
            color: BLUE,
        }],
        &[],
    )?;
    Ok(HistogramSummary { edges, counts })
}

pub fn plot_posterior_bkg_amplitude<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    bkg_samples: &[f64],
    band: &str,
    title: bool,
) -> Result<HistogramSummary> {
    let caption = format!("Uniform background level - {}", band);
    step_histogram(area, bkg_samples, title.then_some(caption.as_str()), band)
}

pub fn plot_posterior_template_amplitude<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    template_samples: &[f64],
    band: &str,
    template_name: &str,
    title: bool,
) -> Result<HistogramSummary> {
    let caption = format!("{} template level - {}", template_name, band);
    step_histogram(area, template_samples, title.then_some(caption.as_str()), band)
}

/// Histogram of the source count over samples with its median marked.
/// Returns the median.
pub fn plot_src_number_posterior<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    nsrc_fov: &[f64],
    title: bool,
) -> Result<f64> {
    let edges = equal_width_edges(nsrc_fov, SRC_NUMBER_BINS)?;
    let counts = histogram(nsrc_fov, &edges)?;
    let med = median(nsrc_fov).ok_or_else(|| DiagError::InvalidInput("no finite source counts".to_string()))?;

    draw_step_histograms(
        area,
        title.then_some("Posterior Source Number Histogram"),
        "N_src",
        "Number of samples",
        &[StepHist {
            label: Some("Posterior".to_string()),
            edges,
            heights: counts.iter().map(|c| *c as f64).collect(),
            color: BLUE,
        }],
        &[VLine {
            x: med,
            label: Some(format!("Median={}", med)),
            color: BLUE,
        }],
    )?;
    Ok(med)
}

fn check_counts(log_sv: &[f64], counts: &ArrayView2<'_, f64>) -> Result<()> {
    if log_sv.is_empty() {
        return invalid("no flux bins to plot");
    }
    if counts.ncols() != log_sv.len() {
        return Err(DiagError::ShapeMismatch(format!(
            "{} flux bins but counts have {} columns",
            log_sv.len(),
            counts.ncols()
        )));
    }
    Ok(())
}

pub(crate) struct LogCountsStyle<'a> {
    pub caption: Option<&'a str>,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub label: Option<&'a str>,
    /// Join the points with a line, as opposed to bare markers.
    pub connect: bool,
}

/// Points on a log y axis with optional asymmetric error bars. Values are
/// clipped into the y range so that empty bins stay on the plot.
pub(crate) fn draw_log_counts<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    style: &LogCountsStyle<'_>,
    xs: &[f64],
    ys: &[f64],
    errors: Option<(&[f64], &[f64])>,
) -> Result<()> {
    let (y_lo, y_hi) = style.y_range;
    let clip = |v: f64| if v.is_finite() { v.clamp(y_lo, y_hi) } else { y_lo };

    let mut builder = ChartBuilder::on(area);
    builder.margin(15).x_label_area_size(45).y_label_area_size(60);
    if let Some(caption) = style.caption {
        builder.caption(caption, ("sans-serif", 18));
    }
    let mut chart = builder.build_cartesian_2d(
        style.x_range.0..style.x_range.1,
        (y_lo..y_hi).log_scale(),
    )?;

    chart
        .configure_mesh()
        .x_desc(style.x_desc)
        .y_desc(style.y_desc)
        .x_max_light_lines(0)
        .y_max_light_lines(0)
        .label_style(("sans-serif", 14))
        .y_label_formatter(&|v| format!("{:.0e}", v))
        .draw()?;

    let points: Vec<(f64, f64)> = xs.iter().zip(ys.iter()).map(|(x, y)| (*x, clip(*y))).collect();

    if let Some((lower, upper)) = errors {
        chart.draw_series(points.iter().zip(lower.iter().zip(upper.iter())).map(|(&(x, y), (lo, hi))| {
            ErrorBar::new_vertical(x, clip(*lo), y, clip(*hi), BLUE.filled(), 6)
        }))?;
    }
    if style.connect {
        chart.draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(1)))?;
    }
    let drawn = chart.draw_series(points.iter().map(|p| Circle::new(*p, 3, BLUE.filled())))?;
    if let Some(label) = style.label {
        drawn
            .label(label)
            .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", 14))
            .draw()?;
    }
    Ok(())
}

/// Mean raw counts per flux bin over samples (`[sample, bin]`), with 16th
/// and 84th percentile error bars.
pub fn plot_posterior_flux_dist<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    log_sv: &[f64],
    raw_number_counts: ArrayView2<'_, f64>,
    band: &str,
    title: bool,
) -> Result<ColumnSummary> {
    check_counts(log_sv, &raw_number_counts)?;
    let summary = column_summary(raw_number_counts)?;
    let xs: Vec<f64> = log_sv.iter().map(|v| v + 3.0).collect();
    let caption = format!("Posterior Flux Distribution - {}", band);
    let x_desc = format!("log10(Flux) - {}", band);
    let (x_lo, x_hi) = crate::plot::axis_range(xs.iter().copied());

    draw_log_counts(
        area,
        &LogCountsStyle {
            caption: title.then_some(caption.as_str()),
            x_desc: &x_desc,
            y_desc: "",
            x_range: (x_lo, x_hi),
            y_range: FLUX_DIST_YLIM,
            label: Some("Posterior"),
            connect: false,
        },
        &xs,
        &summary.mean,
        Some((summary.lower.as_slice(), summary.upper.as_slice())),
    )?;
    Ok(summary)
}

/// Euclidean-normalized number counts over samples (`[sample, bin]`).
pub fn plot_posterior_number_counts<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    log_sv: &[f64],
    lit_number_counts: ArrayView2<'_, f64>,
    trueminf: f64,
    band: &str,
    title: bool,
) -> Result<ColumnSummary> {
    if !(trueminf.is_finite() && trueminf > 0.0) {
        return invalid(format!("minimum flux must be positive, got {}", trueminf));
    }
    check_counts(log_sv, &lit_number_counts)?;
    let summary = column_summary(lit_number_counts)?;
    let xs: Vec<f64> = log_sv.iter().map(|v| v + 3.0).collect();
    let caption = format!("Posterior Flux Distribution - {}", band);
    let x_lo = trueminf.log10() + 3.0 - 0.5 - 1.0;

    draw_log_counts(
        area,
        &LogCountsStyle {
            caption: title.then_some(caption.as_str()),
            x_desc: "log(S_ν) (mJy)",
            y_desc: "dN/dS.S^2.5 (Jy^1.5/sr)",
            x_range: crate::plot::padded_range(x_lo, 2.5),
            y_range: NUMBER_COUNTS_YLIM,
            label: Some("Posterior"),
            connect: true,
        },
        &xs,
        &summary.mean,
        Some((summary.lower.as_slice(), summary.upper.as_slice())),
    )?;
    Ok(summary)
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorPosterior {
    pub edges: Vec<f64>,
    pub density: Vec<f64>,
    pub mock_density: Option<Vec<f64>>,
}

fn flux_ratio<'a, I>(num: I, den: I) -> Vec<f64>
where
    I: Iterator<Item = &'a f64>,
{
    num.zip(den)
        .map(|(a, b)| a / b)
        .filter(|r| r.is_finite())
        .collect()
}

/// Density of the flux ratio between two bands. `fsrcs` is indexed by band
/// along its first axis; every remaining element is one sample. The optional
/// mock truth is indexed `[band, source]`.
pub fn plot_color_posterior<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    fsrcs: ArrayViewD<'_, f64>,
    band0: usize,
    band1: usize,
    wavelengths: &[u32],
    mock_truth_fluxes: Option<ArrayView2<'_, f64>>,
    title: bool,
) -> Result<ColorPosterior> {
    if fsrcs.ndim() == 0 {
        return invalid("flux samples need a band axis");
    }
    let n_bands = fsrcs.shape()[0];
    for band in [band0, band1] {
        if band >= n_bands {
            return Err(DiagError::BandOutOfRange { band, available: n_bands });
        }
        if band >= wavelengths.len() {
            return invalid(format!("no wavelength for band {}", band));
        }
    }

    let (lo, hi, num) = COLOR_EDGES;
    let edges = linspace(lo, hi, num);
    let posterior = flux_ratio(
        fsrcs.index_axis(Axis(0), band0).iter(),
        fsrcs.index_axis(Axis(0), band1).iter(),
    );
    let posterior_density = density(&histogram(&posterior, &edges)?, &edges);

    let mut hists = vec![StepHist {
        label: Some("Posterior".to_string()),
        edges: edges.clone(),
        heights: posterior_density.clone(),
        color: BLUE,
    }];

    let mock_density = match mock_truth_fluxes {
        Some(truth) => {
            for band in [band0, band1] {
                if band >= truth.nrows() {
                    return Err(DiagError::BandOutOfRange { band, available: truth.nrows() });
                }
            }
            let ratios = flux_ratio(truth.row(band0).iter(), truth.row(band1).iter());
            let d = density(&histogram(&ratios, &edges)?, &edges);
            hists.push(StepHist {
                label: Some("Mock Truth".to_string()),
                edges: edges.clone(),
                heights: d.clone(),
                color: RGBColor(255, 127, 14),
            });
            Some(d)
        }
        None => None,
    };

    let x_desc = format!("F_{}/F_{}", wavelengths[band0], wavelengths[band1]);
    draw_step_histograms(
        area,
        title.then_some("Posterior Color Distribution"),
        &x_desc,
        "PDF",
        &hists,
        &[],
    )?;

    Ok(ColorPosterior {
        edges,
        density: posterior_density,
        mock_density,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::render_svg;
    use ndarray::{array, Array3};

    #[test]
    fn flux_ratio_drops_division_by_zero() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 0.0, 1.0];
        assert_eq!(flux_ratio(a.iter(), b.iter()), vec![0.5, 3.0]);
    }

    #[test]
    fn count_summaries_need_matching_bins() {
        let counts = array![[1.0, 2.0], [3.0, 4.0]];
        let err = render_svg((200, 200), |area| {
            plot_posterior_flux_dist(area, &[0.1, 0.2, 0.3], counts.view(), "250 micron", true).map(|_| ())
        });
        assert!(matches!(err, Err(DiagError::ShapeMismatch(_))));
        let err = render_svg((200, 200), |area| {
            plot_posterior_number_counts(area, &[0.1, 0.2], counts.view(), 0.0, "250 micron", true).map(|_| ())
        });
        assert!(matches!(err, Err(DiagError::InvalidInput(_))));
    }

    #[test]
    fn color_posterior_checks_bands() {
        let fsrcs = Array3::<f64>::ones((2, 4, 3));
        let err = render_svg((200, 200), |area| {
            plot_color_posterior(area, fsrcs.view().into_dyn(), 0, 2, &[250, 350, 500], None, true).map(|_| ())
        });
        assert!(matches!(err, Err(DiagError::BandOutOfRange { band: 2, available: 2 })));
    }

    #[test]
    fn src_number_posterior_rejects_empty_chain() {
        let err = render_svg((200, 200), |area| plot_src_number_posterior(area, &[], false).map(|_| ()));
        assert!(err.is_err());
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn color_posterior_density_integrates_to_one() {
        let fsrcs = Array3::from_shape_fn((2, 50, 4), |(b, i, j)| {
            if b == 0 {
                0.02 + 0.001 * (i * 4 + j) as f64
            } else {
                0.01
            }
        });
        let truth = array![[0.02, 0.03], [0.01, 0.01]];
        let mut result = None;
        render_svg((640, 480), |area| {
            result = Some(plot_color_posterior(
                area,
                fsrcs.view().into_dyn(),
                0,
                1,
                &[250, 350, 500],
                Some(truth.view()),
                true,
            )?);
            Ok(())
        })
        .unwrap();
        let result = result.unwrap();
        assert_eq!(result.edges.len(), 50);
        let integral: f64 = result
            .density
            .iter()
            .zip(result.edges.windows(2))
            .map(|(d, w)| d * (w[1] - w[0]))
            .sum();
        assert!((integral - 1.0).abs() < 1e-9);
        assert!(result.mock_density.is_some());
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn src_number_posterior_reports_median() {
        let nsrc: Vec<f64> = (0..101).map(|i| 200.0 + i as f64).collect();
        let mut med = 0.0;
        render_svg((640, 480), |area| {
            med = plot_src_number_posterior(area, &nsrc, true)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(med, 250.0);
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn flux_dist_renders_svg() {
        let log_sv = [-2.0, -1.5, -1.0];
        let counts = array![[10.0, 4.0, 0.0], [12.0, 6.0, 1.0], [14.0, 5.0, 2.0]];
        let mut summary = None;
        let svg = render_svg((640, 480), |area| {
            summary = Some(plot_posterior_flux_dist(area, &log_sv, counts.view(), "250 micron", true)?);
            Ok(())
        })
        .unwrap();
        assert_eq!(summary.unwrap().mean, vec![12.0, 5.0, 1.0]);
        assert!(svg.contains("Posterior Flux Distribution"));
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn number_counts_posterior_renders_svg() {
        let log_sv = [-2.0, -1.5, -1.0];
        let counts = array![[2e3, 8e2, 0.0], [3e3, 1e3, 50.0]];
        let mut summary = None;
        let svg = render_svg((640, 480), |area| {
            summary = Some(plot_posterior_number_counts(area, &log_sv, counts.view(), 0.005, "350 micron", true)?);
            Ok(())
        })
        .unwrap();
        assert_eq!(summary.unwrap().mean, vec![2.5e3, 9e2, 25.0]);
        assert!(svg.contains("Posterior"));
    }
}
