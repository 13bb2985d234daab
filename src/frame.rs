//! Live 2×3 diagnostic frame: data, model and residual images per band plus
//! the current number counts.

use log::debug;
use ndarray::{Array2, ArrayView2};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::error::{invalid, DiagError, Result};
use crate::number_counts::{compute_dnds, NumberCounts};
use crate::plot::{draw_image_panel, ImagePanel, Marker};
use crate::posterior::{draw_log_counts, LogCountsStyle};
use crate::stats::percentile;

pub const FRAME_SIZE: (u32, u32) = (1800, 800);
pub const N_SLOTS: usize = 6;

const RAW_COUNTS_YLIM: (f64, f64) = (5e-1, 3e3);
const EUCLIDEAN_COUNTS_YLIM: (f64, f64) = (1e0, 1e5);
const WEIGHTED_RESIDUAL_CLIP: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Data { band: usize, zoom: bool },
    Model { band: usize, zoom: bool },
    Residual { band: usize, zoom: bool },
    NumberCounts,
}

const PANEL_TOKENS: [(&str, Panel); 19] = [
    ("data0", Panel::Data { band: 0, zoom: false }),
    ("data0zoom", Panel::Data { band: 0, zoom: true }),
    ("data1", Panel::Data { band: 1, zoom: false }),
    ("data1zoom", Panel::Data { band: 1, zoom: true }),
    ("data2", Panel::Data { band: 2, zoom: false }),
    ("data2zoom", Panel::Data { band: 2, zoom: true }),
    ("model0", Panel::Model { band: 0, zoom: false }),
    ("model0zoom", Panel::Model { band: 0, zoom: true }),
    ("model1", Panel::Model { band: 1, zoom: false }),
    ("model1zoom", Panel::Model { band: 1, zoom: true }),
    ("model2", Panel::Model { band: 2, zoom: false }),
    ("model2zoom", Panel::Model { band: 2, zoom: true }),
    ("residual0", Panel::Residual { band: 0, zoom: false }),
    ("residual0zoom", Panel::Residual { band: 0, zoom: true }),
    ("residual1", Panel::Residual { band: 1, zoom: false }),
    ("residual1zoom", Panel::Residual { band: 1, zoom: true }),
    ("residual2", Panel::Residual { band: 2, zoom: false }),
    ("residual2zoom", Panel::Residual { band: 2, zoom: true }),
    ("dNdS", Panel::NumberCounts),
];

impl Panel {
    pub fn band(&self) -> Option<usize> {
        match self {
            Panel::Data { band, .. } | Panel::Model { band, .. } | Panel::Residual { band, .. } => Some(*band),
            Panel::NumberCounts => None,
        }
    }

    fn zoomed(&self) -> bool {
        matches!(
            self,
            Panel::Data { zoom: true, .. } | Panel::Model { zoom: true, .. } | Panel::Residual { zoom: true, .. }
        )
    }

    pub fn title(&self) -> String {
        let (kind, band) = match self {
            Panel::Data { band, .. } => ("Data", *band),
            Panel::Model { band, .. } => ("Model", *band),
            Panel::Residual { band, .. } => ("Residual", *band),
            Panel::NumberCounts => return "dN/dS".to_string(),
        };
        let which = match band {
            0 => "first band".to_string(),
            1 => "second band".to_string(),
            2 => "third band".to_string(),
            b => format!("band {}", b),
        };
        if self.zoomed() {
            format!("{} ({}, zoomed in)", kind, which)
        } else {
            format!("{} ({})", kind, which)
        }
    }
}

impl FromStr for Panel {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self> {
        PANEL_TOKENS
            .iter()
            .find(|(token, _)| *token == s)
            .map(|(_, panel)| *panel)
            .ok_or_else(|| DiagError::UnknownPanel(s.to_string()))
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, band, zoom) = match self {
            Panel::Data { band, zoom } => ("data", band, zoom),
            Panel::Model { band, zoom } => ("model", band, zoom),
            Panel::Residual { band, zoom } => ("residual", band, zoom),
            Panel::NumberCounts => return write!(f, "dNdS"),
        };
        write!(f, "{}{}{}", kind, band, if *zoom { "zoom" } else { "" })
    }
}

/// Panels of the six slots, filled row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    panels: [Panel; N_SLOTS],
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            panels: [
                Panel::Data { band: 0, zoom: false },
                Panel::Model { band: 0, zoom: false },
                Panel::Residual { band: 0, zoom: false },
                Panel::Residual { band: 1, zoom: false },
                Panel::Residual { band: 2, zoom: false },
                Panel::Residual { band: 2, zoom: true },
            ],
        }
    }
}

impl FrameLayout {
    pub fn new(panels: [Panel; N_SLOTS]) -> Self {
        Self { panels }
    }

    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        if tokens.len() != N_SLOTS {
            return invalid(format!("a frame has {} panels, got {}", N_SLOTS, tokens.len()));
        }
        let mut layout = Self::default();
        for (slot, token) in tokens.iter().enumerate() {
            layout.panels[slot] = token.as_ref().parse()?;
        }
        Ok(layout)
    }

    /// Replaces the panel in one slot.
    pub fn with_panel(mut self, slot: usize, panel: Panel) -> Result<Self> {
        if slot >= N_SLOTS {
            return invalid(format!("slot {} is outside the {}-slot frame", slot, N_SLOTS));
        }
        self.panels[slot] = panel;
        Ok(self)
    }

    pub fn panels(&self) -> &[Panel; N_SLOTS] {
        &self.panels
    }
}

/// Zoom window in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

#[derive(Debug, Clone)]
pub struct FrameOptions {
    /// Zoom window per band.
    pub zoom_limits: Vec<ZoomLimits>,
    /// Field area in square degrees.
    pub ndeg: f64,
    /// Fraction of the field actually observed.
    pub frac: f64,
    pub raw_counts: bool,
    pub weighted_residual: bool,
    /// Pause after presenting, giving a live viewer time to refresh.
    pub refresh_pause: Duration,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            zoom_limits: vec![
                ZoomLimits { x: [90.0, 140.0], y: [70.0, 120.0] },
                ZoomLimits { x: [70.0, 110.0], y: [70.0, 110.0] },
                ZoomLimits { x: [50.0, 70.0], y: [50.0, 70.0] },
            ],
            ndeg: 0.11,
            frac: 1.0,
            raw_counts: false,
            weighted_residual: false,
            refresh_pause: Duration::from_micros(10),
        }
    }
}

/// Maps first-band pixel positions into the pixel grid of another band.
pub trait Astrometry {
    /// `index` selects the target band: index `b - 1` maps onto band `b`.
    fn transform_q(&self, x: &[f64], y: &[f64], index: usize) -> Result<(Vec<f64>, Vec<f64>)>;
}

/// All bands share the first band's pixel grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAstrometry;

impl Astrometry for IdentityAstrometry {
    fn transform_q(&self, x: &[f64], y: &[f64], _index: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        Ok((x.to_vec(), y.to_vec()))
    }
}

/// Per-band affine maps `x' = a·x + b·y + c`, `y' = d·x + e·y + f`, stored as
/// `[[a, b, c], [d, e, f]]`.
#[derive(Debug, Clone)]
pub struct AffineAstrometry {
    pub transforms: Vec<[[f64; 3]; 2]>,
}

impl AffineAstrometry {
    /// Pure rescaling by the ratio of pixel sizes, as between bands imaged
    /// at different resolutions.
    pub fn from_scales(scales: &[f64]) -> Self {
        Self {
            transforms: scales
                .iter()
                .map(|s| [[*s, 0.0, 0.0], [0.0, *s, 0.0]])
                .collect(),
        }
    }
}

impl Astrometry for AffineAstrometry {
    fn transform_q(&self, x: &[f64], y: &[f64], index: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        let [[a, b, c], [d, e, f]] = *self.transforms.get(index).ok_or(DiagError::BandOutOfRange {
            band: index + 1,
            available: self.transforms.len() + 1,
        })?;
        if x.len() != y.len() {
            return Err(DiagError::ShapeMismatch("x and y positions differ in length".to_string()));
        }
        Ok(x.iter()
            .zip(y.iter())
            .map(|(x, y)| (a * x + b * y + c, d * x + e * y + f))
            .unzip())
    }
}

/// Observed image of one band with its optional inverse-variance weights.
#[derive(Debug, Clone)]
pub struct BandImage {
    pub data: Array2<f64>,
    pub weights: Option<Array2<f64>>,
}

impl BandImage {
    pub fn new(data: Array2<f64>, weights: Option<Array2<f64>>) -> Result<Self> {
        if let Some(w) = &weights {
            if w.dim() != data.dim() {
                return Err(DiagError::ShapeMismatch(format!(
                    "weights are {:?} but data is {:?}",
                    w.dim(),
                    data.dim()
                )));
            }
        }
        Ok(Self { data, weights })
    }
}

/// Sampler state the frame is drawn from.
pub struct FrameState<'a, A: Astrometry> {
    pub images: &'a [BandImage],
    pub catalog: &'a Catalog,
    pub astrometry: &'a A,
    /// Minimum source flux in Jy.
    pub trueminf: f64,
}

fn full_limits(image: &ArrayView2<'_, f64>) -> ([f64; 2], [f64; 2]) {
    let (rows, cols) = image.dim();
    ([-0.5, cols as f64 - 0.5], [-0.5, rows as f64 - 0.5])
}

fn percentile_limits(values: &[f64], lo: f64, hi: f64) -> Result<(f64, f64)> {
    match (percentile(values, lo), percentile(values, hi)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => invalid("image has no finite pixels"),
    }
}

/// Cross half-width in pixels for a source of the given flux. Cross area
/// follows flux, as with a scatter size of `100·flux`.
pub fn marker_size(flux: f64) -> u32 {
    let s = (flux.max(0.0) * 100.0).sqrt();
    s.round().clamp(1.0, 40.0) as u32
}

/// Residual image and color limits as shown in a residual panel.
///
/// Weighted residuals are `resid·sqrt(weight)` clipped to ±5. Otherwise the
/// raw residual is shown between its 5th and 95th percentiles, taken over
/// pixels with non-zero weight (all pixels when there are no weights).
pub fn residual_display(
    resid: ArrayView2<'_, f64>,
    weights: Option<ArrayView2<'_, f64>>,
    weighted: bool,
) -> Result<(Array2<f64>, f64, f64)> {
    if let Some(w) = &weights {
        if w.dim() != resid.dim() {
            return Err(DiagError::ShapeMismatch(format!(
                "weights are {:?} but residual is {:?}",
                w.dim(),
                resid.dim()
            )));
        }
    }

    if weighted {
        let w = weights.ok_or_else(|| {
            DiagError::InvalidInput("weighted residuals need a weight map".to_string())
        })?;
        let mut scaled = Array2::<f64>::zeros(resid.dim());
        ndarray::Zip::from(&mut scaled)
            .and(&resid)
            .and(&w)
            .for_each(|out, r, w| {
                *out = (r * w.max(0.0).sqrt()).clamp(-WEIGHTED_RESIDUAL_CLIP, WEIGHTED_RESIDUAL_CLIP)
            });
        return Ok((scaled, -WEIGHTED_RESIDUAL_CLIP, WEIGHTED_RESIDUAL_CLIP));
    }

    let observed: Vec<f64> = match &weights {
        Some(w) => resid
            .iter()
            .zip(w.iter())
            .filter(|(_, w)| **w != 0.0)
            .map(|(r, _)| *r)
            .collect(),
        None => resid.iter().copied().collect(),
    };
    let (vmin, vmax) = percentile_limits(&observed, 5.0, 95.0)?;
    Ok((resid.to_owned(), vmin, vmax))
}

fn source_markers<A: Astrometry>(state: &FrameState<'_, A>, band: usize) -> Result<Vec<Marker>> {
    let catalog = state.catalog;
    let x = catalog.x().to_vec();
    let y = catalog.y().to_vec();
    let (xp, yp) = if band == 0 {
        (x, y)
    } else {
        state.astrometry.transform_q(&x, &y, band - 1)?
    };
    let flux = catalog.flux(band)?;
    Ok(xp
        .iter()
        .zip(yp.iter())
        .zip(flux.iter())
        .map(|((x, y), f)| Marker {
            x: *x,
            y: *y,
            size: marker_size(*f),
        })
        .collect())
}

fn check_panels<A: Astrometry>(
    layout: &FrameLayout,
    state: &FrameState<'_, A>,
    resids: &[Array2<f64>],
    models: &[Array2<f64>],
    options: &FrameOptions,
) -> Result<()> {
    for panel in layout.panels() {
        let (band, available) = match panel {
            Panel::Data { band, .. } => (*band, state.images.len().min(state.catalog.n_bands())),
            Panel::Model { band, .. } => (*band, models.len()),
            Panel::Residual { band, .. } => (*band, resids.len().min(state.images.len())),
            Panel::NumberCounts => continue,
        };
        if band >= available {
            return Err(DiagError::BandOutOfRange { band, available });
        }
        if panel.zoomed() && band >= options.zoom_limits.len() {
            return invalid(format!("no zoom limits for band {}", band));
        }
    }
    Ok(())
}

fn draw_number_counts<DB: DrawingBackend, A: Astrometry>(
    area: &DrawingArea<DB, Shift>,
    state: &FrameState<'_, A>,
    options: &FrameOptions,
) -> Result<()> {
    let counts = if state.catalog.n() == 0 {
        NumberCounts::empty()
    } else {
        compute_dnds(state.trueminf, state.catalog, state.catalog.n())?
    };
    let xs: Vec<f64> = counts.log_sv.iter().map(|v| v + 3.0).collect();
    let (ys, y_desc, y_range) = if options.raw_counts {
        (
            counts.dnds.iter().map(|n| *n as f64).collect::<Vec<f64>>(),
            "dN/dS",
            RAW_COUNTS_YLIM,
        )
    } else {
        (
            counts.euclidean_normalized(options.ndeg, options.frac),
            "dN/dS.S^2.5 (Jy^1.5/sr)",
            EUCLIDEAN_COUNTS_YLIM,
        )
    };
    let x_lo = state.trueminf.log10() + 3.0 - 0.5;
    draw_log_counts(
        area,
        &LogCountsStyle {
            caption: None,
            x_desc: "log(S_ν) (mJy)",
            y_desc,
            x_range: crate::plot::padded_range(x_lo, 2.5),
            y_range,
            label: None,
            connect: true,
        },
        &xs,
        &ys,
        None,
    )
}

fn draw_panel<DB: DrawingBackend, A: Astrometry>(
    area: &DrawingArea<DB, Shift>,
    panel: Panel,
    state: &FrameState<'_, A>,
    resids: &[Array2<f64>],
    models: &[Array2<f64>],
    options: &FrameOptions,
) -> Result<()> {
    let title = panel.title();
    let (band, image, vmin, vmax, markers) = match panel {
        Panel::Data { band, .. } => {
            let data = state.images[band].data.view();
            let pixels: Vec<f64> = data.iter().copied().collect();
            let (vmin, vmax) = percentile_limits(&pixels, 5.0, 99.9)?;
            (band, data.to_owned(), vmin, vmax, source_markers(state, band)?)
        }
        Panel::Model { band, .. } => {
            let model = models[band].view();
            let pixels: Vec<f64> = model.iter().copied().collect();
            let (vmin, vmax) = percentile_limits(&pixels, 5.0, 99.9)?;
            (band, model.to_owned(), vmin, vmax, Vec::new())
        }
        Panel::Residual { band, .. } => {
            let weights = state.images[band].weights.as_ref().map(|w| w.view());
            let (image, vmin, vmax) = residual_display(resids[band].view(), weights, options.weighted_residual)?;
            (band, image, vmin, vmax, Vec::new())
        }
        Panel::NumberCounts => return draw_number_counts(area, state, options),
    };

    let (xlim, ylim) = if panel.zoomed() {
        let zoom = options.zoom_limits[band];
        (zoom.x, zoom.y)
    } else {
        full_limits(&image.view())
    };

    draw_image_panel(
        area,
        &ImagePanel {
            image: image.view(),
            vmin,
            vmax,
            title: &title,
            xlim,
            ylim,
            markers: &markers,
        },
    )
}

/// Redraws the whole frame into `area`: clears it, draws the six panels of
/// `layout` on a 2×3 grid, presents, then pauses for `options.refresh_pause`.
pub fn plot_custom_multiband_frame<DB: DrawingBackend, A: Astrometry>(
    area: &DrawingArea<DB, Shift>,
    state: &FrameState<'_, A>,
    resids: &[Array2<f64>],
    models: &[Array2<f64>],
    layout: &FrameLayout,
    options: &FrameOptions,
) -> Result<()> {
    check_panels(layout, state, resids, models, options)?;

    area.fill(&WHITE)?;
    let cells = area.split_evenly((2, 3));
    for (cell, panel) in cells.iter().zip(layout.panels().iter()) {
        debug!("drawing panel {}", panel);
        draw_panel(cell, *panel, state, resids, models, options)?;
    }
    area.present()?;

    if !options.refresh_pause.is_zero() {
        std::thread::sleep(options.refresh_pause);
    }
    Ok(())
}
