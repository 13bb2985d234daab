use ndarray::{s, Array2, ArrayView1};

use crate::error::{invalid, DiagError, Result};

pub const X_ROW: usize = 0;
pub const Y_ROW: usize = 1;
/// Row of the first band's flux; band `b` lives at `FLUX_ROW + b`.
pub const FLUX_ROW: usize = 2;

/// Sampler catalog indexed `[attribute, source]`. Only the first `n`
/// columns hold active sources.
#[derive(Debug, Clone)]
pub struct Catalog {
    table: Array2<f64>,
    n: usize,
}

impl Catalog {
    pub fn new(table: Array2<f64>, n: usize) -> Result<Self> {
        if table.nrows() <= FLUX_ROW {
            return Err(DiagError::ShapeMismatch(format!(
                "catalog needs at least {} attribute rows, got {}",
                FLUX_ROW + 1,
                table.nrows()
            )));
        }
        if n > table.ncols() {
            return invalid(format!(
                "active source count {} exceeds catalog capacity {}",
                n,
                table.ncols()
            ));
        }
        Ok(Self { table, n })
    }

    /// Builds a single-band catalog from position and flux lists.
    pub fn from_sources(x: &[f64], y: &[f64], flux: &[f64]) -> Result<Self> {
        if x.len() != y.len() || x.len() != flux.len() {
            return Err(DiagError::ShapeMismatch(
                "x, y and flux lists must have the same length".to_string(),
            ));
        }
        let n = x.len();
        let mut table = Array2::<f64>::zeros((FLUX_ROW + 1, n));
        for i in 0..n {
            table[[X_ROW, i]] = x[i];
            table[[Y_ROW, i]] = y[i];
            table[[FLUX_ROW, i]] = flux[i];
        }
        Self::new(table, n)
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn n_bands(&self) -> usize {
        self.table.nrows() - FLUX_ROW
    }

    pub fn table(&self) -> &Array2<f64> {
        &self.table
    }

    pub fn x(&self) -> ArrayView1<'_, f64> {
        self.table.slice(s![X_ROW, ..self.n])
    }

    pub fn y(&self) -> ArrayView1<'_, f64> {
        self.table.slice(s![Y_ROW, ..self.n])
    }

    pub fn flux(&self, band: usize) -> Result<ArrayView1<'_, f64>> {
        if band >= self.n_bands() {
            return Err(DiagError::BandOutOfRange {
                band,
                available: self.n_bands(),
            });
        }
        Ok(self.table.slice(s![FLUX_ROW + band, ..self.n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn active_columns_only() {
        let table = array![
            [1.0, 2.0, 99.0],
            [3.0, 4.0, 99.0],
            [0.01, 0.02, 99.0],
            [0.03, 0.04, 99.0]
        ];
        let cat = Catalog::new(table, 2).unwrap();
        assert_eq!(cat.n_bands(), 2);
        assert_eq!(cat.x().to_vec(), vec![1.0, 2.0]);
        assert_eq!(cat.flux(1).unwrap().to_vec(), vec![0.03, 0.04]);
        assert!(matches!(
            cat.flux(2),
            Err(DiagError::BandOutOfRange { band: 2, available: 2 })
        ));
    }

    #[test]
    fn rejects_overfull_catalog() {
        let table = Array2::<f64>::zeros((3, 2));
        assert!(Catalog::new(table, 3).is_err());
        assert!(Catalog::new(Array2::<f64>::zeros((2, 4)), 1).is_err());
    }
}
