//! Diagnostic plots for multiband point-source MCMC catalogs: number counts,
//! chain autocorrelation, trace and posterior plots, residual maps, the live
//! multi-panel frame and GIF assembly of rendered frames.
//!
//! Every plotting function draws into a caller-owned plotters
//! [`DrawingArea`](plotters::drawing::DrawingArea), so the same code renders
//! to PNG, SVG or any other backend.

pub mod atcr;
pub mod catalog;
pub mod chain;
pub mod error;
pub mod frame;
pub mod gif;
pub mod number_counts;
pub mod plot;
pub mod posterior;
pub mod report;
pub mod residual;
pub mod resources;
pub mod stats;
pub mod trace;

pub use atcr::{autocorrelation, plot_atcr, Autocorrelation};
pub use catalog::Catalog;
pub use chain::{grab_atcr, ChainArchive};
pub use error::{DiagError, Result};
pub use frame::{
    plot_custom_multiband_frame, AffineAstrometry, Astrometry, BandImage, FrameLayout, FrameOptions, FrameState,
    IdentityAstrometry, Panel,
};
pub use gif::{convert_png_to_gif, FrameSource, GifOptions};
pub use number_counts::{compute_dnds, NumberCounts};
pub use posterior::{
    plot_color_posterior, plot_posterior_bkg_amplitude, plot_posterior_flux_dist, plot_posterior_number_counts,
    plot_posterior_template_amplitude, plot_src_number_posterior,
};
pub use residual::{plot_residual_1pt_function, plot_residual_map, ResidualMapOptions, ResidualMode};
pub use resources::plot_comp_resources;
pub use stats::scotts_rule_bins;
pub use trace::{
    plot_acceptance_fractions, plot_bkg_sample_chain, plot_chi_squared, plot_src_number_trace,
    plot_template_amplitude_sample_chain,
};
