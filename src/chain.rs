//! Reader for `.npz` chain archives written by the sampler.

use log::{debug, warn};
use ndarray::{s, Array1, Array2, ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::NpzReader;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::atcr::{plot_atcr, Autocorrelation};
use crate::error::{invalid, DiagError, Result};

pub const BAND_LABELS: [&str; 3] = ["250 micron", "350 micron", "500 micron"];
pub const WAVELENGTHS: [u32; 3] = [250, 350, 500];

pub fn band_label(band: usize) -> String {
    BAND_LABELS
        .get(band)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("band {}", band))
}

/// `{result_dir}/{timestr}/chain.npz`
pub fn chain_path<P: AsRef<Path>>(result_dir: P, timestr: &str) -> PathBuf {
    result_dir.as_ref().join(timestr).join("chain.npz")
}

pub struct ChainArchive {
    path: PathBuf,
    reader: NpzReader<BufReader<File>>,
    entries: Vec<String>,
}

impl ChainArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut reader = NpzReader::new(BufReader::new(file))?;
        let mut entries = reader.names()?;
        entries.sort();
        debug!("opened {} with {} arrays", path.display(), entries.len());
        Ok(Self {
            path,
            reader,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parameter names, without the `.npy` suffix.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.strip_suffix(".npy").unwrap_or(e).to_string())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry_name(name).is_some()
    }

    fn entry_name(&self, name: &str) -> Option<String> {
        let with_suffix = format!("{}.npy", name);
        self.entries
            .iter()
            .find(|e| e.as_str() == name || **e == with_suffix)
            .cloned()
    }

    /// Loads a parameter as `f64`, whatever numeric type it was stored with.
    pub fn param(&mut self, name: &str) -> Result<ArrayD<f64>> {
        let entry = self
            .entry_name(name)
            .ok_or_else(|| DiagError::MissingParameter(name.to_string()))?;

        let reader = &mut self.reader;

        macro_rules! try_load {
            ($ty:ty) => {
                if let Ok(array) = reader.by_name::<OwnedRepr<$ty>, IxDyn>(&entry) {
                    return Ok(array.mapv(|v| v as f64));
                }
            };
        }

        if let Ok(array) = reader.by_name::<OwnedRepr<f64>, IxDyn>(&entry) {
            return Ok(array);
        }
        try_load!(f32);
        try_load!(i64);
        try_load!(i32);

        invalid(format!(
            "parameter '{}' has an unsupported dtype (expected f64, f32, i64 or i32)",
            name
        ))
    }

    /// A 1-D parameter, or a 2-D one with a single column.
    pub fn series(&mut self, name: &str) -> Result<Array1<f64>> {
        let array = self.param(name)?;
        match array.ndim() {
            1 => Ok(array.iter().copied().collect()),
            2 if array.shape()[1] == 1 => Ok(array.iter().copied().collect()),
            _ => Err(DiagError::ShapeMismatch(format!(
                "'{}' has shape {:?}, expected a 1-D series",
                name,
                array.shape()
            ))),
        }
    }

    /// A 2-D parameter indexed `[sample, column]`.
    pub fn matrix(&mut self, name: &str) -> Result<Array2<f64>> {
        let array = self.param(name)?;
        let shape = array.shape().to_vec();
        match shape.as_slice() {
            [rows, cols] => Array2::from_shape_vec((*rows, *cols), array.iter().copied().collect())
                .map_err(|e| DiagError::ShapeMismatch(e.to_string())),
            [rows] => Array2::from_shape_vec((*rows, 1), array.iter().copied().collect())
                .map_err(|e| DiagError::ShapeMismatch(e.to_string())),
            _ => Err(DiagError::ShapeMismatch(format!(
                "'{}' has shape {:?}, expected a 2-D array",
                name, shape
            ))),
        }
    }

    /// The last `nsamp` samples of one band of a parameter: `[-nsamp:, band]`
    /// for per-band arrays, `[-nsamp:, band, template_idx]` for per-template
    /// ones. Chains shorter than `nsamp` are returned whole.
    pub fn tail_series(
        &mut self,
        name: &str,
        nsamp: usize,
        band: usize,
        template_idx: Option<usize>,
    ) -> Result<Array1<f64>> {
        if nsamp == 0 {
            return invalid("nsamp must be positive");
        }
        let array = self.param(name)?;
        let shape = array.shape().to_vec();
        let n = shape.first().copied().unwrap_or(0);
        if n == 0 {
            return invalid(format!("'{}' holds no samples", name));
        }
        if nsamp > n {
            warn!("'{}' has only {} samples, using all of them", name, n);
        }
        let start = n.saturating_sub(nsamp);

        let check_band = |available: usize| {
            if band >= available {
                Err(DiagError::BandOutOfRange { band, available })
            } else {
                Ok(())
            }
        };

        match shape.len() {
            1 => {
                if band != 0 {
                    check_band(1)?;
                }
                Ok(array.slice(s![start..]).iter().copied().collect())
            }
            2 => {
                check_band(shape[1])?;
                Ok(array.slice(s![start.., band]).iter().copied().collect())
            }
            3 => {
                check_band(shape[1])?;
                let idx = template_idx.ok_or_else(|| {
                    DiagError::InvalidInput(format!(
                        "'{}' is indexed by template; a template index is required",
                        name
                    ))
                })?;
                if idx >= shape[2] {
                    return invalid(format!(
                        "template index {} out of range ({} templates)",
                        idx, shape[2]
                    ));
                }
                Ok(array.slice(s![start.., band, idx]).iter().copied().collect())
            }
            _ => Err(DiagError::ShapeMismatch(format!(
                "'{}' has shape {:?}; expected 1 to 3 axes",
                name, shape
            ))),
        }
    }
}

/// Loads `{result_dir}/{timestr}/chain.npz` and plots the autocorrelation of
/// the last `nsamp` samples of `param` in `band`.
pub fn grab_atcr<DB: DrawingBackend, P: AsRef<Path>>(
    area: &DrawingArea<DB, Shift>,
    result_dir: P,
    timestr: &str,
    param: &str,
    band: usize,
    nsamp: usize,
    template_idx: Option<usize>,
) -> Result<Autocorrelation> {
    let mut archive = ChainArchive::open(chain_path(result_dir, timestr))?;
    let samples = archive.tail_series(param, nsamp, band, template_idx)?;
    let title = format!("{}, {}", param, band_label(band));
    plot_atcr(area, samples.view(), &title)
}
