use clap::Parser;
pub use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pcatdiag",
    version,
    about = "Diagnostic figures for multiband point-source MCMC chains.",
    after_help = "Figures are written as PNG files. Set RUST_LOG=info (or debug) for progress output."
)]
pub struct Args {
    /// Path to the chain archive (.npz)
    #[arg(long, aliases = ["ch", "cha", "chai"])]
    pub chain: Option<PathBuf>,

    /// Directory for the figures. Defaults to `diagnostics/` next to the chain.
    #[arg(long, aliases = ["out", "output"])]
    pub output_dir: Option<PathBuf>,

    /// Plot the autocorrelation of this chain parameter.
    #[arg(long, value_name = "PARAM")]
    pub atcr: Option<String>,

    /// Band index (0: 250, 1: 350, 2: 500 micron).
    #[arg(long, default_value_t = 0)]
    pub band: usize,

    /// Number of trailing samples used for autocorrelation and posteriors.
    #[arg(long, default_value_t = 500)]
    pub nsamp: usize,

    /// Template index for per-template parameters such as template_amplitudes.
    #[arg(long, default_value_t = 0)]
    pub template_idx: usize,

    /// First chi-squared sample shown in the summary.
    #[arg(long, default_value_t = 0)]
    pub burn_in: usize,

    /// Render the standard trace and posterior figure set.
    #[arg(long, aliases = ["sum", "summ"])]
    pub summary: bool,

    /// Write diagnostics.json with medians and autocorrelation times.
    #[arg(long)]
    pub json: bool,

    /// Assemble N numbered PNG frames into an animated GIF.
    #[arg(long, value_name = "N")]
    pub gif: Option<usize>,

    /// Explicit frame list for the GIF, used in the given order.
    #[arg(long, num_args = 1.., value_name = "FILES")]
    pub frames: Vec<PathBuf>,

    /// Directory holding the numbered frames; the GIF is written here too.
    #[arg(long, default_value = "figures/frame_dir")]
    pub gif_dir: PathBuf,

    /// File name prefix of the numbered frames.
    #[arg(long, default_value = "median_residual_and_smoothed_band")]
    pub gif_head: String,

    /// Output GIF name, without extension.
    #[arg(long, default_value = "multiz")]
    pub gif_name: String,

    /// GIF frame rate.
    #[arg(long, default_value_t = 2)]
    pub fps: u32,
}
