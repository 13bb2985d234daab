//! Standard diagnostic figure set for one chain archive, plus a JSON summary.

use log::{info, warn};
use ndarray::Array1;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::fs;
use std::path::{Path, PathBuf};

use crate::atcr::autocorrelation;
use crate::chain::{band_label, ChainArchive};
use crate::error::{DiagError, Result};
use crate::plot::{render_png, FIGURE_SIZE};
use crate::posterior::{plot_posterior_bkg_amplitude, plot_posterior_template_amplitude, plot_src_number_posterior};
use crate::resources::{plot_comp_resources, DEFAULT_RESOURCE_LABELS};
use crate::stats::{mean, median, std_dev};
use crate::trace::{
    plot_acceptance_fractions, plot_bkg_sample_chain, plot_chi_squared, plot_src_number_trace,
    plot_template_amplitude_sample_chain, DEFAULT_PROPOSAL_TYPES,
};

pub const BKG_KEY: &str = "bkg";
pub const TEMPLATE_KEY: &str = "template_amplitudes";
pub const CHI2_KEY: &str = "chi2";
pub const ACCEPT_KEY: &str = "accept";
pub const NSRC_KEY: &str = "n";
pub const TIMESTATS_KEY: &str = "timestats";

pub const SUMMARY_FILE: &str = "diagnostics.json";

#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub band: usize,
    /// Trailing samples used for posteriors and autocorrelation.
    pub nsamp: usize,
    /// First chi-squared sample shown.
    pub burn_in: usize,
    pub template_idx: usize,
    pub template_name: String,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            band: 0,
            nsamp: 500,
            burn_in: 0,
            template_idx: 0,
            template_name: "sze".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterSummary {
    pub name: String,
    pub n_samples: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    /// Autocorrelation time in samples.
    pub tau: Option<usize>,
}

impl ParameterSummary {
    pub fn from_samples(name: &str, samples: &[f64]) -> Self {
        let tau = match autocorrelation(Array1::from(samples.to_vec()).view()) {
            Ok(atcr) => atcr.tau[0],
            Err(err) => {
                warn!("no autocorrelation time for {}: {}", name, err);
                None
            }
        };
        Self {
            name: name.to_string(),
            n_samples: samples.len(),
            mean: mean(samples),
            median: median(samples),
            std: std_dev(samples),
            tau,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSummary {
    pub chain: PathBuf,
    pub band: usize,
    pub band_label: String,
    pub nsamp: usize,
    pub parameters: Vec<ParameterSummary>,
    pub figures: Vec<PathBuf>,
}

impl DiagnosticsSummary {
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("summary written to {}", path.as_ref().display());
        Ok(())
    }
}

fn column_or_series(archive: &mut ChainArchive, name: &str, band: usize) -> Result<Vec<f64>> {
    let matrix = archive.matrix(name)?;
    if matrix.ncols() == 1 {
        return Ok(matrix.column(0).to_vec());
    }
    if band >= matrix.ncols() {
        return Err(DiagError::BandOutOfRange {
            band,
            available: matrix.ncols(),
        });
    }
    Ok(matrix.column(band).to_vec())
}

/// Renders every figure the archive has data for into `output_dir` and
/// returns what was drawn.
pub fn render_summary(
    archive: &mut ChainArchive,
    output_dir: &Path,
    options: &SummaryOptions,
) -> Result<DiagnosticsSummary> {
    fs::create_dir_all(output_dir)?;
    let band = options.band;
    let label = band_label(band);
    let mut parameters = Vec::new();
    let mut figures = Vec::new();

    if archive.contains(BKG_KEY) {
        let bkg = archive.tail_series(BKG_KEY, options.nsamp, band, None)?.to_vec();
        let trace = output_dir.join(format!("bkg_trace_band{}.png", band));
        render_png(&trace, FIGURE_SIZE, |area| plot_bkg_sample_chain(area, &bkg, &label, true))?;
        let posterior = output_dir.join(format!("bkg_posterior_band{}.png", band));
        render_png(&posterior, FIGURE_SIZE, |area| {
            plot_posterior_bkg_amplitude(area, &bkg, &label, true).map(|_| ())
        })?;
        figures.extend([trace, posterior]);
        parameters.push(ParameterSummary::from_samples(BKG_KEY, &bkg));
    }

    if archive.contains(TEMPLATE_KEY) {
        let amps = archive
            .tail_series(TEMPLATE_KEY, options.nsamp, band, Some(options.template_idx))?
            .to_vec();
        let name = &options.template_name;
        let trace = output_dir.join(format!("{}_trace_band{}.png", name, band));
        render_png(&trace, FIGURE_SIZE, |area| {
            plot_template_amplitude_sample_chain(area, &amps, &label, name, true)
        })?;
        let posterior = output_dir.join(format!("{}_posterior_band{}.png", name, band));
        render_png(&posterior, FIGURE_SIZE, |area| {
            plot_posterior_template_amplitude(area, &amps, &label, name, true).map(|_| ())
        })?;
        figures.extend([trace, posterior]);
        parameters.push(ParameterSummary::from_samples(TEMPLATE_KEY, &amps));
    }

    if archive.contains(CHI2_KEY) {
        let chi2 = column_or_series(archive, CHI2_KEY, band)?;
        let burn_in = options.burn_in.min(chi2.len().saturating_sub(1));
        let sample_number: Vec<usize> = (burn_in..chi2.len()).collect();
        let path = output_dir.join(format!("chi2_band{}.png", band));
        render_png(&path, FIGURE_SIZE, |area| {
            plot_chi_squared(area, &chi2, &sample_number, &label).map(|_| ())
        })?;
        figures.push(path);
    }

    if archive.contains(ACCEPT_KEY) {
        let accept = archive.matrix(ACCEPT_KEY)?;
        let n_types = accept.ncols().min(DEFAULT_PROPOSAL_TYPES.len());
        let path = output_dir.join("acceptance_fractions.png");
        render_png(&path, FIGURE_SIZE, |area| {
            plot_acceptance_fractions(area, accept.view(), &DEFAULT_PROPOSAL_TYPES[..n_types])
        })?;
        figures.push(path);
    }

    if archive.contains(NSRC_KEY) {
        let nsrc = archive.tail_series(NSRC_KEY, options.nsamp, 0, None)?.to_vec();
        let trace = output_dir.join("nsrc_trace.png");
        render_png(&trace, FIGURE_SIZE, |area| plot_src_number_trace(area, &nsrc, true))?;
        let posterior = output_dir.join("nsrc_posterior.png");
        render_png(&posterior, FIGURE_SIZE, |area| {
            plot_src_number_posterior(area, &nsrc, true).map(|_| ())
        })?;
        figures.extend([trace, posterior]);
        parameters.push(ParameterSummary::from_samples(NSRC_KEY, &nsrc));
    }

    if archive.contains(TIMESTATS_KEY) {
        let timestats = archive.matrix(TIMESTATS_KEY)?;
        if timestats.ncols() == DEFAULT_RESOURCE_LABELS.len() {
            let path = output_dir.join("comp_resources.png");
            render_png(&path, FIGURE_SIZE, |area| {
                plot_comp_resources(area, timestats.view(), None, &DEFAULT_RESOURCE_LABELS).map(|_| ())
            })?;
            figures.push(path);
        } else {
            warn!(
                "'{}' has {} columns, expected {}; skipping resource plot",
                TIMESTATS_KEY,
                timestats.ncols(),
                DEFAULT_RESOURCE_LABELS.len()
            );
        }
    }

    info!("{} figures written to {}", figures.len(), output_dir.display());
    Ok(DiagnosticsSummary {
        chain: archive.path().to_path_buf(),
        band,
        band_label: label,
        nsamp: options.nsamp,
        parameters,
        figures,
    })
}
