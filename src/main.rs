use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use log::info;

mod args;

use args::Args;
use pcatdiag::atcr::{plot_atcr, ATCR_FIGURE_SIZE};
use pcatdiag::chain::{band_label, ChainArchive};
use pcatdiag::gif::{convert_png_to_gif, FrameSource, GifOptions};
use pcatdiag::plot::render_png;
use pcatdiag::report::{render_summary, DiagnosticsSummary, ParameterSummary, SummaryOptions, SUMMARY_FILE};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if std::env::args().len() <= 1 {
                Args::command().print_help()?;
                process::exit(0);
            }
            e.exit();
        }
    };

    let wants_gif = args.gif.is_some() || !args.frames.is_empty();
    if wants_gif {
        run_gif(&args)?;
    }

    let chain_path = match &args.chain {
        Some(path) => path.clone(),
        None if wants_gif => return Ok(()),
        None => {
            if args.atcr.is_some() || args.summary || args.json {
                return Err(anyhow!("--chain is required for --atcr, --summary and --json"));
            }
            Args::command().print_help()?;
            return Ok(());
        }
    };

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(&chain_path));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create output directory {:?}", output_dir))?;

    let mut archive = ChainArchive::open(&chain_path)
        .with_context(|| format!("failed to open chain archive {:?}", chain_path))?;

    let mut parameters = Vec::new();
    if let Some(param) = &args.atcr {
        parameters.push(run_atcr(&mut archive, param, &args, &output_dir)?);
    }

    let summary = if args.summary {
        let options = SummaryOptions {
            band: args.band,
            nsamp: args.nsamp,
            burn_in: args.burn_in,
            template_idx: args.template_idx,
            ..SummaryOptions::default()
        };
        let mut summary =
            render_summary(&mut archive, &output_dir, &options).context("failed to render summary figures")?;
        summary
            .parameters
            .retain(|p| !parameters.iter().any(|q: &ParameterSummary| q.name == p.name));
        summary.parameters.extend(parameters);
        summary
    } else {
        DiagnosticsSummary {
            chain: chain_path.clone(),
            band: args.band,
            band_label: band_label(args.band),
            nsamp: args.nsamp,
            parameters,
            figures: Vec::new(),
        }
    };

    if args.json {
        let path = output_dir.join(SUMMARY_FILE);
        summary
            .write_json(&path)
            .with_context(|| format!("failed to write {:?}", path))?;
        println!("Summary: {}", path.display());
    }
    for figure in &summary.figures {
        println!("Figure: {}", figure.display());
    }
    Ok(())
}

fn default_output_dir(chain_path: &Path) -> PathBuf {
    chain_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join("diagnostics")
}

fn run_atcr(archive: &mut ChainArchive, param: &str, args: &Args, output_dir: &Path) -> Result<ParameterSummary> {
    let samples = archive
        .tail_series(param, args.nsamp, args.band, Some(args.template_idx))
        .with_context(|| format!("failed to read '{}' from the chain", param))?;
    let title = format!("{}, {}", param, band_label(args.band));
    let path = output_dir.join(format!("atcr_{}_band{}.png", param, args.band));

    let mut tau = None;
    render_png(&path, ATCR_FIGURE_SIZE, |area| {
        tau = plot_atcr(area, samples.view(), &title)?.max_tau();
        Ok(())
    })
    .with_context(|| format!("failed to plot autocorrelation of '{}'", param))?;

    match tau {
        Some(t) => println!("{} ({}): autocorrelation time {} samples", param, band_label(args.band), t),
        None => println!(
            "{} ({}): autocorrelation stays above threshold over {} samples",
            param,
            band_label(args.band),
            samples.len()
        ),
    }
    info!("autocorrelation figure written to {}", path.display());

    let mut summary = ParameterSummary::from_samples(param, &samples.to_vec());
    summary.tau = tau;
    Ok(summary)
}

fn run_gif(args: &Args) -> Result<()> {
    let options = GifOptions {
        fps: args.fps,
        gifdir: args.gif_dir.clone(),
        head_name: args.gif_head.clone(),
        name: args.gif_name.clone(),
    };
    let source = if args.frames.is_empty() {
        options.numbered(args.gif.unwrap_or(0))
    } else {
        FrameSource::Files(args.frames.clone())
    };
    let output = options.output_path();
    let n = convert_png_to_gif(&source, &output, options.fps)
        .with_context(|| format!("failed to assemble {:?}", output))?;
    println!("GIF: {} ({} frames at {} fps)", output.display(), n, options.fps);
    Ok(())
}
