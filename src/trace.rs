//! Sample-chain trace plots.

use log::{debug, warn};
use ndarray::ArrayView2;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{invalid, DiagError, Result};
use crate::plot::{draw_line_chart, HLine, Series, SERIES_COLORS};

pub const DEFAULT_PROPOSAL_TYPES: [&str; 5] = ["All", "Move", "Birth/Death", "Merge/Split", "Templates"];

fn indexed(samples: &[f64]) -> Vec<(f64, f64)> {
    samples
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64, *v))
        .collect()
}

fn require_samples(samples: &[f64], what: &str) -> Result<()> {
    if samples.is_empty() {
        return invalid(format!("no {} samples to plot", what));
    }
    Ok(())
}

/// Uniform background level against sample index.
pub fn plot_bkg_sample_chain<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    bkg_samples: &[f64],
    band: &str,
    title: bool,
) -> Result<()> {
    require_samples(bkg_samples, "background")?;
    let caption = format!("Uniform background level - {}", band);
    draw_line_chart(
        area,
        title.then_some(caption.as_str()),
        "Sample index",
        "Amplitude [Jy/beam]",
        &[Series {
            label: Some(band.to_string()),
            points: indexed(bkg_samples),
            color: BLUE,
        }],
        &[],
    )
}

pub fn plot_template_amplitude_sample_chain<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    template_samples: &[f64],
    band: &str,
    template_name: &str,
    title: bool,
) -> Result<()> {
    require_samples(template_samples, "template amplitude")?;
    let caption = format!("{} template level - {}", template_name, band);
    draw_line_chart(
        area,
        title.then_some(caption.as_str()),
        "Sample index",
        "Amplitude [Jy/beam]",
        &[Series {
            label: Some(band.to_string()),
            points: indexed(template_samples),
            color: BLUE,
        }],
        &[],
    )
}

/// Chi-squared from the burn-in sample onwards. `sample_number[0]` is the
/// burn-in index into `chi2`, and the remaining chain must line up with
/// `sample_number`. Returns the minimum chi-squared after burn-in.
pub fn plot_chi_squared<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    chi2: &[f64],
    sample_number: &[usize],
    band: &str,
) -> Result<f64> {
    let burn_in = match sample_number.first() {
        Some(b) => *b,
        None => return invalid("sample numbers are empty"),
    };
    if burn_in >= chi2.len() {
        return invalid(format!(
            "burn-in sample {} is past the end of a {}-sample chain",
            burn_in,
            chi2.len()
        ));
    }
    let kept = &chi2[burn_in..];
    if kept.len() != sample_number.len() {
        return Err(DiagError::ShapeMismatch(format!(
            "{} sample numbers for {} post burn-in chi-squared values",
            sample_number.len(),
            kept.len()
        )));
    }
    let min_chi2 = kept.iter().copied().fold(f64::INFINITY, f64::min);
    debug!("chi-squared minimum after burn-in {}: {}", burn_in, min_chi2);

    draw_line_chart(
        area,
        None,
        "Sample",
        "Chi-Squared",
        &[Series {
            label: Some(band.to_string()),
            points: sample_number
                .iter()
                .zip(kept.iter())
                .map(|(s, c)| (*s as f64, *c))
                .collect(),
            color: BLUE,
        }],
        &[HLine {
            y: min_chi2,
            label: Some(format!("{} ({})", min_chi2, band)),
            color: BLUE,
        }],
    )?;
    Ok(min_chi2)
}

/// Acceptance fraction per proposal type, indexed `[sample, proposal type]`.
/// NaN entries (no proposals of that type yet) are drawn as zero; the input
/// is left untouched.
pub fn plot_acceptance_fractions<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    accept_stats: ArrayView2<'_, f64>,
    proposal_types: &[&str],
) -> Result<()> {
    if accept_stats.nrows() == 0 {
        return invalid("no acceptance statistics to plot");
    }
    if proposal_types.len() > accept_stats.ncols() {
        return Err(DiagError::ShapeMismatch(format!(
            "{} proposal types but only {} acceptance columns",
            proposal_types.len(),
            accept_stats.ncols()
        )));
    }

    let mut cleaned = accept_stats.to_owned();
    let n_nan = cleaned.iter().filter(|v| v.is_nan()).count();
    if n_nan > 0 {
        warn!("{} NaN acceptance fractions drawn as zero", n_nan);
        cleaned.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });
    }

    let series: Vec<Series> = proposal_types
        .iter()
        .enumerate()
        .map(|(x, name)| Series {
            label: Some(name.to_string()),
            points: cleaned
                .column(x)
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f64, *v))
                .collect(),
            color: SERIES_COLORS[x % SERIES_COLORS.len()],
        })
        .collect();

    draw_line_chart(area, None, "Sample number", "Acceptance fraction", &series, &[])
}

/// Source number against sample index, post burn-in.
pub fn plot_src_number_trace<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    nsrc_fov: &[f64],
    title: bool,
) -> Result<()> {
    require_samples(nsrc_fov, "source number")?;
    draw_line_chart(
        area,
        title.then_some("Source number trace plot (post burn-in)"),
        "Sample index",
        "N_src",
        &[Series {
            label: None,
            points: indexed(nsrc_fov),
            color: BLUE,
        }],
        &[],
    )
}
