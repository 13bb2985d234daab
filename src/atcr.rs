//! Chain autocorrelation via the Wiener–Khinchin theorem.

use log::debug;
use ndarray::{Array2, ArrayView, Dimension};
use num_complex::Complex;
use plotters::coord::Shift;
use plotters::prelude::*;
use rustfft::FftPlanner;

use crate::error::{invalid, DiagError, Result};
use crate::plot::SERIES_COLORS;

type C64 = Complex<f64>;

/// The correlation time is the first lag whose normalized autocorrelation
/// falls below this level.
pub const ATCR_THRESHOLD: f64 = 0.2;

pub const ATCR_FIGURE_SIZE: (u32, u32) = (600, 400);

#[derive(Debug, Clone)]
pub struct Autocorrelation {
    /// Normalized autocorrelation indexed `[lag, column]`; lag 0 is 1.
    pub lags: Array2<f64>,
    /// Correlation time per column, `None` if the curve never drops below
    /// [`ATCR_THRESHOLD`] within the kept lags.
    pub tau: Vec<Option<usize>>,
}

impl Autocorrelation {
    pub fn n_lags(&self) -> usize {
        self.lags.nrows()
    }

    /// Longest correlation time over all columns. `None` if any column never
    /// decorrelated.
    pub fn max_tau(&self) -> Option<usize> {
        self.tau
            .iter()
            .try_fold(0usize, |acc, t| t.map(|t| acc.max(t)))
    }
}

/// Autocorrelation of a chain whose first axis is the sample index. A 1-D
/// chain is one column; trailing axes of higher-dimensional chains are
/// flattened into columns.
pub fn autocorrelation<D: Dimension>(chain: ArrayView<'_, f64, D>) -> Result<Autocorrelation> {
    if chain.ndim() == 0 {
        return invalid("autocorrelation needs at least a 1-D chain");
    }
    let n = chain.shape()[0];
    if n < 2 {
        return invalid(format!("autocorrelation needs at least 2 samples, got {}", n));
    }
    if chain.iter().any(|v| !v.is_finite()) {
        return invalid("chain contains non-finite samples");
    }
    let n_cols = chain.len() / n;
    let samples = Array2::from_shape_vec((n, n_cols), chain.iter().copied().collect())
        .map_err(|e| DiagError::ShapeMismatch(e.to_string()))?;

    // Circular estimator: the transform runs at the chain length, so only the
    // first half of the lags is free of wrap-around.
    let n_lags = n / 2;
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut lags = Array2::<f64>::zeros((n_lags, n_cols));
    let mut tau = Vec::with_capacity(n_cols);

    for (col, column) in samples.columns().into_iter().enumerate() {
        let mean = column.sum() / n as f64;
        let mut buffer: Vec<C64> = column.iter().map(|v| C64::new(v - mean, 0.0)).collect();
        let max_dev = buffer.iter().map(|c| c.re.abs()).fold(0.0, f64::max);
        // Deviations within rounding of the mean carry no signal.
        if max_dev <= n as f64 * f64::EPSILON * mean.abs() {
            return Err(DiagError::ZeroVariance(col));
        }

        forward.process(&mut buffer);
        for c in buffer.iter_mut() {
            *c = C64::new(c.norm_sqr(), 0.0);
        }
        inverse.process(&mut buffer);

        let zero_lag = buffer[0].re;
        for k in 0..n_lags {
            lags[[k, col]] = buffer[k].re / zero_lag;
        }
        let t = (0..n_lags).find(|&k| lags[[k, col]] < ATCR_THRESHOLD);
        debug!("autocorrelation column {}: tau = {:?} over {} lags", col, t, n_lags);
        tau.push(t);
    }

    Ok(Autocorrelation { lags, tau })
}

/// Plots the normalized autocorrelation of `chain` against lag, one line per
/// column, annotated with the correlation time.
pub fn plot_atcr<DB, D>(
    area: &DrawingArea<DB, Shift>,
    chain: ArrayView<'_, f64, D>,
    title: &str,
) -> Result<Autocorrelation>
where
    DB: DrawingBackend,
    D: Dimension,
{
    let atcr = autocorrelation(chain)?;
    let n_lags = atcr.n_lags().max(2);
    let y_min = atcr.lags.iter().copied().fold(0.0, f64::min) - 0.05;
    let y_max = 1.05;

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 18))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..(n_lags - 1) as f64, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("τ")
        .y_desc("ξ(τ)")
        .x_max_light_lines(0)
        .y_max_light_lines(0)
        .axis_style(BLACK.stroke_width(1))
        .label_style(("sans-serif", 14))
        .draw()?;

    chart.draw_series(DashedLineSeries::new(
        vec![(0.0, 0.0), ((n_lags - 1) as f64, 0.0)],
        6,
        4,
        BLACK.mix(0.5).stroke_width(1),
    ))?;

    for (col, column) in atcr.lags.columns().into_iter().enumerate() {
        let color = SERIES_COLORS[col % SERIES_COLORS.len()];
        chart.draw_series(LineSeries::new(
            column.iter().enumerate().map(|(k, v)| (k as f64, *v)),
            color.stroke_width(1),
        ))?;
    }

    let label = match atcr.max_tau() {
        Some(t) => format!("τ_exp = {}", t),
        None => format!("τ_exp > {}", atcr.n_lags()),
    };
    let text_x = 0.8 * (n_lags - 1) as f64;
    let text_y = y_min + 0.8 * (y_max - y_min);
    chart.draw_series(std::iter::once(Text::new(
        label,
        (text_x, text_y),
        ("sans-serif", 16).into_font().color(&BLACK),
    )))?;

    Ok(atcr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Axis};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn white_noise(n: usize, seed: u64) -> Array1<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..n).map(|_| normal.sample(&mut rng)).collect()
    }

    fn ar1(n: usize, phi: f64, seed: u64) -> Array1<f64> {
        let noise = white_noise(n + 1000, seed);
        let mut x = 0.0;
        let mut out = Vec::with_capacity(n);
        for (i, e) in noise.iter().enumerate() {
            x = phi * x + e;
            if i >= 1000 {
                out.push(x);
            }
        }
        Array1::from(out)
    }

    #[test]
    fn white_noise_decorrelates_at_lag_one() {
        let chain = white_noise(4096, 7);
        let atcr = autocorrelation(chain.view()).unwrap();
        assert_eq!(atcr.n_lags(), 2048);
        assert!((atcr.lags[[0, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(atcr.tau, vec![Some(1)]);
    }

    #[test]
    fn correlated_chain_stays_high() {
        let chain = ar1(16384, 0.95, 11);
        let atcr = autocorrelation(chain.view()).unwrap();
        for k in 1..5 {
            assert!(atcr.lags[[k, 0]] > 0.6, "lag {} = {}", k, atcr.lags[[k, 0]]);
        }
        let tau = atcr.tau[0].unwrap();
        assert!((15..=60).contains(&tau), "tau = {}", tau);
    }

    #[test]
    fn matches_circular_sum() {
        let n = 63;
        let chain = white_noise(n, 3);
        let atcr = autocorrelation(chain.view()).unwrap();
        assert_eq!(atcr.n_lags(), 31);
        let mean = chain.mean().unwrap();
        let centered: Vec<f64> = chain.iter().map(|v| v - mean).collect();
        let c0: f64 = centered.iter().map(|v| v * v).sum();
        for k in 0..atcr.n_lags() {
            let ck: f64 = (0..n).map(|i| centered[i] * centered[(i + k) % n]).sum();
            assert!((atcr.lags[[k, 0]] - ck / c0).abs() < 1e-9);
        }
    }

    #[test]
    fn ramp_wraps_around() {
        let chain = Array1::from_iter((0..100).map(|i| i as f64));
        let atcr = autocorrelation(chain.view()).unwrap();
        assert_eq!(atcr.tau, vec![Some(16)]);
        assert!(atcr.lags[[20, 0]] < 0.1, "lag 20 = {}", atcr.lags[[20, 0]]);
    }

    #[test]
    fn large_offset_keeps_small_scatter() {
        let chain = Array1::from_iter((0..200).map(|i| if i % 2 == 0 { 1e6 + 0.5 } else { 1e6 - 0.5 }));
        let atcr = autocorrelation(chain.view()).unwrap();
        assert_eq!(atcr.tau, vec![Some(1)]);
    }

    #[test]
    fn columns_are_independent() {
        let noise = white_noise(2048, 5);
        let slow = ar1(2048, 0.9, 5);
        let chain = ndarray::stack(Axis(1), &[noise.view(), slow.view()]).unwrap();
        let atcr = autocorrelation(chain.view()).unwrap();
        assert_eq!(atcr.lags.ncols(), 2);
        assert_eq!(atcr.tau[0], Some(1));
        assert!(atcr.tau[1].unwrap() > 5);
        assert_eq!(atcr.max_tau(), atcr.tau[1]);
    }

    #[test]
    fn constant_column_is_rejected() {
        let chain = Array1::from(vec![0.1; 32]);
        assert!(matches!(
            autocorrelation(chain.view()),
            Err(DiagError::ZeroVariance(0))
        ));
        let chain = ndarray::stack(Axis(1), &[white_noise(32, 1).view(), Array1::zeros(32).view()]).unwrap();
        assert!(matches!(
            autocorrelation(chain.view()),
            Err(DiagError::ZeroVariance(1))
        ));
    }

    #[test]
    fn too_short_chain_is_rejected() {
        let chain = Array1::from(vec![1.0]);
        assert!(autocorrelation(chain.view()).is_err());
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn plot_atcr_renders_svg() {
        let chain = white_noise(512, 2);
        let svg = crate::plot::render_svg(ATCR_FIGURE_SIZE, |area| {
            plot_atcr(area, chain.view(), "bkg, 250 micron").map(|_| ())
        })
        .unwrap();
        assert!(svg.contains("<svg"));
    }
}
