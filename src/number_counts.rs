//! Differential source counts (dN/dS) of a sampler catalog.

use log::{debug, warn};
use std::f64::consts::PI;

use crate::catalog::Catalog;
use crate::error::{invalid, Result};
use crate::stats::{histogram, linspace};

/// Number of log-flux bin edges.
pub const NUMBER_COUNT_EDGES: usize = 20;

/// Offset taking log10 of a flux in Jy to log10 in mJy.
const MJY_OFFSET: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct NumberCounts {
    /// Bin centres, log10 of flux in Jy.
    pub log_sv: Vec<f64>,
    /// Bin widths in Jy.
    pub dsz: Vec<f64>,
    /// Raw sources per bin.
    pub dnds: Vec<u64>,
    /// Bin edges, log10 of flux in mJy.
    pub bin_edges: Vec<f64>,
}

impl NumberCounts {
    pub(crate) fn empty() -> Self {
        Self {
            log_sv: Vec::new(),
            dsz: Vec::new(),
            dnds: Vec::new(),
            bin_edges: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dnds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dnds.len()
    }

    /// Bin edges as linear fluxes in Jy.
    pub fn binz_sz(&self) -> Vec<f64> {
        self.bin_edges
            .iter()
            .map(|e| 10f64.powf(e - MJY_OFFSET))
            .collect()
    }

    /// Euclidean-normalized counts `dN/dS · S^2.5` per steradian, for a field
    /// of `ndeg` square degrees of which `frac` is actually observed.
    pub fn euclidean_normalized(&self, ndeg: f64, frac: f64) -> Vec<f64> {
        let n_steradian = ndeg / (180.0 / PI).powi(2) * frac;
        self.dnds
            .iter()
            .zip(self.log_sv.iter())
            .zip(self.dsz.iter())
            .map(|((&n, &log_s), &ds)| n as f64 * 10f64.powf(log_s).powf(2.5) / n_steradian / ds)
            .collect()
    }
}

/// Histogram of the first band's fluxes in log-flux space.
pub fn compute_dnds(trueminf: f64, catalog: &Catalog, nsrc: usize) -> Result<NumberCounts> {
    compute_dnds_for_band(trueminf, catalog, nsrc, 0)
}

pub fn compute_dnds_for_band(
    trueminf: f64,
    catalog: &Catalog,
    nsrc: usize,
    band: usize,
) -> Result<NumberCounts> {
    if !(trueminf.is_finite() && trueminf > 0.0) {
        return invalid(format!("minimum flux must be positive, got {}", trueminf));
    }
    if nsrc == 0 {
        return invalid("number counts need at least one active source");
    }
    if nsrc > catalog.n() {
        return invalid(format!(
            "requested {} sources but catalog holds {}",
            nsrc,
            catalog.n()
        ));
    }

    let active: Vec<f64> = catalog.flux(band)?.iter().take(nsrc).copied().collect();
    if active.iter().any(|f| !f.is_finite()) {
        return invalid("catalog fluxes must be finite");
    }
    let fluxes: Vec<f64> = active.iter().copied().filter(|f| *f > 0.0).collect();
    if fluxes.len() < active.len() {
        warn!(
            "dN/dS: skipping {} of {} sources with non-positive flux",
            active.len() - fluxes.len(),
            active.len()
        );
    }
    if fluxes.is_empty() {
        return Ok(NumberCounts::empty());
    }

    let max_flux = fluxes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lower = trueminf.log10() + MJY_OFFSET;
    let upper = (max_flux.log10() + MJY_OFFSET).ceil();
    if upper <= lower {
        debug!(
            "dN/dS: brightest source {:.3e} Jy is below minimum flux {:.3e} Jy",
            max_flux, trueminf
        );
        return Ok(NumberCounts::empty());
    }

    let bin_edges = linspace(lower, upper, NUMBER_COUNT_EDGES);
    let log_flux: Vec<f64> = fluxes.iter().map(|f| f.log10() + MJY_OFFSET).collect();
    let dnds = histogram(&log_flux, &bin_edges)?;

    let log_sv = bin_edges
        .windows(2)
        .map(|w| 0.5 * (w[0] + w[1]) - MJY_OFFSET)
        .collect();

    let mut counts = NumberCounts {
        log_sv,
        dsz: Vec::new(),
        dnds,
        bin_edges,
    };
    counts.dsz = counts.binz_sz().windows(2).map(|w| w[1] - w[0]).collect();
    Ok(counts)
}
