use std::fs::File;
use std::path::Path;

use ndarray::{Array1, Array2};
use ndarray_npy::NpzWriter;
use pcatdiag::chain::chain_path;
use pcatdiag::report::{render_summary, SummaryOptions};
use pcatdiag::{autocorrelation, compute_dnds, convert_png_to_gif, Catalog, ChainArchive, FrameSource};
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

fn ar1_chain(n: usize, phi: f64, rng: &mut StdRng) -> Array1<f64> {
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut x = 0.0;
    (0..n)
        .map(|_| {
            x = phi * x + normal.sample(rng);
            x
        })
        .collect()
}

fn write_result_dir(dir: &Path) -> std::path::PathBuf {
    let mut rng = StdRng::seed_from_u64(42);
    let n = 2000;
    let mut bkg = Array2::<f64>::zeros((n, 3));
    for band in 0..3 {
        let phi = [0.0, 0.5, 0.9][band];
        bkg.column_mut(band).assign(&ar1_chain(n, phi, &mut rng).mapv(|v| 0.003 + 1e-4 * v));
    }
    let chi2: Array1<f64> = (0..n).map(|i| 1e4 / (1.0 + i as f64) + 900.0).collect();
    let nsrc: Array1<i64> = (0..n).map(|i| 150 + (i % 7) as i64).collect();

    let path = chain_path(dir, "20200101-120000_run");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("bkg", &bkg).unwrap();
    npz.add_array("chi2", &chi2).unwrap();
    npz.add_array("n", &nsrc).unwrap();
    npz.finish().unwrap();
    path
}

#[test]
fn correlation_time_tracks_chain_memory() {
    let dir = tempfile::tempdir().unwrap();
    let mut archive = ChainArchive::open(write_result_dir(dir.path())).unwrap();

    let mut taus = Vec::new();
    for band in 0..3 {
        let samples = archive.tail_series("bkg", 1000, band, None).unwrap();
        assert_eq!(samples.len(), 1000);
        let atcr = autocorrelation(samples.view()).unwrap();
        taus.push(atcr.tau[0].unwrap());
    }
    assert_eq!(taus[0], 1);
    assert!(taus[1] <= taus[2], "{:?}", taus);
    assert!(taus[2] >= 5, "{:?}", taus);
}

#[test]
fn number_counts_from_a_catalog_table() {
    let flux = [0.006, 0.008, 0.012, 0.03, 0.07, 0.2];
    let x: Vec<f64> = (0..flux.len()).map(|i| 10.0 * i as f64).collect();
    let catalog = Catalog::from_sources(&x, &x, &flux).unwrap();
    let counts = compute_dnds(0.005, &catalog, catalog.n()).unwrap();
    assert_eq!(counts.dnds.iter().sum::<u64>(), flux.len() as u64);
    let normed = counts.euclidean_normalized(0.11, 1.0);
    assert_eq!(normed.len(), counts.len());
    assert!(normed.iter().all(|v| *v >= 0.0));
}

#[test]
fn gif_from_rendered_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut frames = Vec::new();
    for i in 0..3 {
        let path = dir.path().join(format!("frame{}.png", i));
        {
            let root = BitMapBackend::new(&path, (64, 48)).into_drawing_area();
            root.fill(&WHITE).unwrap();
            root.draw(&Rectangle::new([(i * 10, 5), (i * 10 + 20, 40)], BLACK.filled()))
                .unwrap();
            root.present().unwrap();
        }
        frames.push(path);
    }
    let output = dir.path().join("multiz.gif");
    let n = convert_png_to_gif(&FrameSource::Files(frames), &output, 2).unwrap();
    assert_eq!(n, 3);
    assert!(std::fs::metadata(&output).unwrap().len() > 0);
}

#[test]
#[ignore = "needs system fonts"]
fn summary_renders_every_available_figure() {
    let dir = tempfile::tempdir().unwrap();
    let mut archive = ChainArchive::open(write_result_dir(dir.path())).unwrap();
    let out = dir.path().join("diagnostics");
    let summary = render_summary(&mut archive, &out, &SummaryOptions::default()).unwrap();
    // bkg trace + posterior, chi2, nsrc trace + posterior
    assert_eq!(summary.figures.len(), 5);
    for figure in &summary.figures {
        assert!(figure.exists(), "{}", figure.display());
    }
    let names: Vec<&str> = summary.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["bkg", "n"]);
}
