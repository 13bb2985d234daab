//! Residual (data minus model) maps and their one-point function.

use log::debug;
use ndarray::{Array2, ArrayView2, ArrayViewD};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use std::fmt;

use crate::error::{invalid, DiagError, Result};
use crate::plot::{draw_image_panel, draw_step_histograms, ImagePanel, StepHist, VLine};
use crate::stats::{histogram, linspace, median, std_dev};

pub const RESIDUAL_MAP_SIZE_SMOOTH: (u32, u32) = (1000, 500);
pub const RESIDUAL_MAP_SIZE: (u32, u32) = (800, 800);
pub const DEFAULT_MINMAX: (f64, f64) = (-0.005, 0.005);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualMode {
    Median,
    Last,
}

impl ResidualMode {
    pub fn title(self) -> &'static str {
        match self {
            ResidualMode::Median => "Median residual",
            ResidualMode::Last => "Last residual",
        }
    }
}

impl fmt::Display for ResidualMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[derive(Debug, Clone)]
pub struct ResidualMapOptions {
    /// Draw a Gaussian-smoothed copy next to the raw residual.
    pub smooth: bool,
    pub smooth_sigma: f64,
    /// Color limits of the raw panel; `None` means [`DEFAULT_MINMAX`].
    pub minmax: Option<(f64, f64)>,
    /// Color limits of the smoothed panel; `None` means [`DEFAULT_MINMAX`].
    pub minmax_smooth: Option<(f64, f64)>,
}

impl Default for ResidualMapOptions {
    fn default() -> Self {
        Self {
            smooth: true,
            smooth_sigma: 3.0,
            minmax: None,
            minmax_smooth: None,
        }
    }
}

impl ResidualMapOptions {
    pub fn figure_size(&self) -> (u32, u32) {
        if self.smooth {
            RESIDUAL_MAP_SIZE_SMOOTH
        } else {
            RESIDUAL_MAP_SIZE
        }
    }
}

/// Separable Gaussian blur with a kernel truncated at 3σ. Pixels beyond the
/// border take the value of the nearest edge pixel.
pub fn gaussian_smooth(image: ArrayView2<'_, f64>, sigma: f64) -> Result<Array2<f64>> {
    if !sigma.is_finite() || sigma < 0.0 {
        return invalid(format!("smoothing sigma must be non-negative, got {}", sigma));
    }
    let (rows, cols) = image.dim();
    if sigma == 0.0 || rows == 0 || cols == 0 {
        return Ok(image.to_owned());
    }

    let radius = (sigma * 3.0).ceil() as isize;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let norm: f64 = kernel.iter().sum();
    let kernel: Vec<f64> = kernel.iter().map(|k| k / norm).collect();

    let clamp = |i: isize, n: usize| i.clamp(0, n as isize - 1) as usize;

    let mut horizontal = Array2::<f64>::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            horizontal[[r, c]] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * image[[r, clamp(c as isize + k as isize - radius, cols)]])
                .sum();
        }
    }

    let mut smoothed = Array2::<f64>::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            smoothed[[r, c]] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * horizontal[[clamp(r as isize + k as isize - radius, rows), c]])
                .sum();
        }
    }
    Ok(smoothed)
}

fn full_limits(image: &ArrayView2<'_, f64>) -> ([f64; 2], [f64; 2]) {
    let (rows, cols) = image.dim();
    ([-0.5, cols as f64 - 0.5], [-0.5, rows as f64 - 0.5])
}

/// Greyscale residual image, with a smoothed companion panel when
/// `options.smooth` is set.
pub fn plot_residual_map<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    resid: ArrayView2<'_, f64>,
    mode: ResidualMode,
    band: &str,
    options: &ResidualMapOptions,
) -> Result<()> {
    if resid.is_empty() {
        return invalid("residual map is empty");
    }
    let (vmin, vmax) = options.minmax.unwrap_or(DEFAULT_MINMAX);
    let (xlim, ylim) = full_limits(&resid);
    let title = format!("{} -- {}", mode.title(), band);

    let panels = if options.smooth {
        area.split_evenly((1, 2))
    } else {
        vec![area.clone()]
    };

    draw_image_panel(
        &panels[0],
        &ImagePanel {
            image: resid,
            vmin,
            vmax,
            title: &title,
            xlim,
            ylim,
            markers: &[],
        },
    )?;

    if options.smooth {
        let smoothed = gaussian_smooth(resid, options.smooth_sigma)?;
        let (smin, smax) = options.minmax_smooth.unwrap_or(DEFAULT_MINMAX);
        draw_image_panel(
            &panels[1],
            &ImagePanel {
                image: smoothed.view(),
                vmin: smin,
                vmax: smax,
                title: "Smoothed Residual",
                xlim,
                ylim,
                markers: &[],
            },
        )?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct OnePointSummary {
    pub median: f64,
    pub std: f64,
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

fn round5(v: f64) -> f64 {
    (v * 1e5).round() / 1e5
}

/// Histogram of residual pixel values over `nbin` edges spread evenly from
/// `binmin` to `binmax`, with the median marked.
pub fn plot_residual_1pt_function<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    resid: ArrayViewD<'_, f64>,
    mode: ResidualMode,
    band: &str,
    binmin: f64,
    binmax: f64,
    nbin: usize,
) -> Result<OnePointSummary> {
    if nbin < 2 || !(binmin < binmax) {
        return invalid(format!(
            "need at least 2 edges over an increasing range, got {} over [{}, {}]",
            nbin, binmin, binmax
        ));
    }
    let pixels: Vec<f64> = resid.iter().copied().filter(|v| v.is_finite()).collect();
    let med = median(&pixels).ok_or_else(|| DiagError::InvalidInput("residual has no finite pixels".to_string()))?;
    let std = std_dev(&pixels).unwrap_or(0.0);
    let edges = linspace(binmin, binmax, nbin);
    let counts = histogram(&pixels, &edges)?;
    debug!("{} 1pt function: median {:.3e}, sigma {:.3e}", band, med, std);

    let caption = format!("{} 1pt function -- {}", mode.title(), band);
    draw_step_histograms(
        area,
        Some(&caption),
        "data - model [Jy/beam]",
        "N_pix",
        &[StepHist {
            label: None,
            edges: edges.clone(),
            heights: counts.iter().map(|c| *c as f64).collect(),
            color: BLUE,
        }],
        &[VLine {
            x: med,
            label: Some(format!("Median={}, σ={}", round5(med), round5(std))),
            color: BLUE,
        }],
    )?;

    Ok(OnePointSummary {
        median: med,
        std,
        edges,
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::render_svg;
    use ndarray::Array2;

    #[test]
    fn smoothing_preserves_constant_images() {
        let image = Array2::from_elem((12, 9), 0.25);
        let smoothed = gaussian_smooth(image.view(), 2.0).unwrap();
        for v in smoothed.iter() {
            assert!((v - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn smoothing_spreads_a_point_source_and_keeps_flux() {
        let mut image = Array2::<f64>::zeros((41, 41));
        image[[20, 20]] = 1.0;
        let smoothed = gaussian_smooth(image.view(), 2.0).unwrap();
        assert!(smoothed[[20, 20]] < 1.0);
        assert!(smoothed[[20, 22]] > 0.0);
        assert!((smoothed[[20, 22]] - smoothed[[22, 20]]).abs() < 1e-15);
        assert!((smoothed.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_sigma_is_identity_and_negative_is_rejected() {
        let image = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f64);
        assert_eq!(gaussian_smooth(image.view(), 0.0).unwrap(), image);
        assert!(gaussian_smooth(image.view(), -1.0).is_err());
    }

    #[test]
    fn options_defaults() {
        let opts = ResidualMapOptions::default();
        assert!(opts.smooth);
        assert_eq!(opts.smooth_sigma, 3.0);
        assert_eq!(opts.figure_size(), RESIDUAL_MAP_SIZE_SMOOTH);
        assert_eq!(ResidualMode::Last.to_string(), "Last residual");
    }

    #[test]
    fn one_point_function_rejects_bad_bins() {
        let resid = Array2::<f64>::zeros((4, 4)).into_dyn();
        let err = render_svg((200, 200), |area| {
            plot_residual_1pt_function(area, resid.view(), ResidualMode::Median, "S", 0.02, -0.02, 50)
                .map(|_| ())
        });
        assert!(matches!(err, Err(DiagError::InvalidInput(_))));
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn one_point_function_counts_in_range_pixels() {
        let resid = Array2::from_shape_fn((10, 10), |(r, c)| ((r * 10 + c) as f64 - 50.0) / 1000.0).into_dyn();
        let mut summary = None;
        render_svg((640, 480), |area| {
            summary = Some(plot_residual_1pt_function(
                area,
                resid.view(),
                ResidualMode::Median,
                "250 micron",
                -0.02,
                0.02,
                50,
            )?);
            Ok(())
        })
        .unwrap();
        let summary = summary.unwrap();
        assert_eq!(summary.edges.len(), 50);
        assert_eq!(summary.counts.iter().sum::<u64>(), 41);
        assert!((summary.median + 0.0005).abs() < 1e-12);
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn residual_map_renders_both_panels() {
        let resid = Array2::from_shape_fn((16, 16), |(r, c)| ((r as f64) - (c as f64)) / 4000.0);
        let opts = ResidualMapOptions::default();
        let svg = render_svg(opts.figure_size(), |area| {
            plot_residual_map(area, resid.view(), ResidualMode::Last, "500 micron", &opts)
        })
        .unwrap();
        assert!(svg.contains("Smoothed Residual"));

        let plain = ResidualMapOptions {
            smooth: false,
            ..ResidualMapOptions::default()
        };
        let svg = render_svg(plain.figure_size(), |area| {
            plot_residual_map(area, resid.view(), ResidualMode::Median, "500 micron", &plain)
        })
        .unwrap();
        assert!(!svg.contains("Smoothed Residual"));
    }
}
