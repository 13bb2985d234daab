//! Small numeric helpers shared by the plotters: moments, percentiles,
//! bin-edge construction and the histogram primitive.

use log::debug;
use ndarray::{ArrayView2, Axis};
use serde::Serialize;

use crate::error::{invalid, Result};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (ddof = 0).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Percentile with linear interpolation between closest ranks.
/// Non-finite values are ignored.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile_sorted(&sorted, q))
}

fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// `num` evenly spaced points over `[start, stop]`, endpoint included.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut out: Vec<f64> = (0..num).map(|i| start + step * i as f64).collect();
            out[num - 1] = stop;
            out
        }
    }
}

/// Counts `values` into the bins described by `edges`.
///
/// Bins are half-open `[a, b)` except the last, which also takes values equal
/// to the final edge. Values outside the edges and non-finite values are not
/// counted.
pub fn histogram(values: &[f64], edges: &[f64]) -> Result<Vec<u64>> {
    if edges.len() < 2 {
        return invalid("histogram needs at least 2 bin edges");
    }
    if edges.windows(2).any(|w| !(w[0] < w[1])) {
        return invalid("histogram bin edges must increase monotonically");
    }

    let nbins = edges.len() - 1;
    let first = edges[0];
    let last = edges[nbins];
    let mut counts = vec![0u64; nbins];
    for &v in values {
        if !v.is_finite() || v < first || v > last {
            continue;
        }
        let idx = if v == last {
            nbins - 1
        } else {
            edges.partition_point(|e| *e <= v) - 1
        };
        counts[idx] += 1;
    }
    Ok(counts)
}

/// Probability density per bin: counts normalized so the histogram integrates to one.
pub fn density(counts: &[u64], edges: &[f64]) -> Vec<f64> {
    let total: u64 = counts.iter().sum();
    counts
        .iter()
        .zip(edges.windows(2))
        .map(|(c, w)| {
            if total == 0 {
                0.0
            } else {
                *c as f64 / (total as f64 * (w[1] - w[0]))
            }
        })
        .collect()
}

/// `nbins` equal-width bins spanning the sample range. A zero-width range is
/// widened by half a unit on either side.
pub fn equal_width_edges(values: &[f64], nbins: usize) -> Result<Vec<f64>> {
    if nbins == 0 {
        return invalid("bin count must be positive");
    }
    let (lo, hi) = match min_max(values) {
        Some(r) => r,
        None => return invalid("no finite samples to bin"),
    };
    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    Ok(linspace(lo, hi, nbins + 1))
}

/// Number of bins from a Scott's-rule bandwidth, `3.5 σ / n^(1/3)`.
pub fn scotts_rule_bin_count(samples: &[f64]) -> Result<usize> {
    let n = samples.len();
    if n < 2 {
        return invalid("Scott's rule needs at least 2 samples");
    }
    if samples.iter().any(|v| !v.is_finite()) {
        return invalid("Scott's rule needs finite samples");
    }
    let sigma = std_dev(samples).unwrap_or(0.0);
    let (lo, hi) = min_max(samples).unwrap_or((0.0, 0.0));
    if sigma <= 0.0 || hi <= lo {
        return invalid("samples have zero spread; cannot size bins");
    }
    let bin_width = 3.5 * sigma / (n as f64).cbrt();
    let k = ((hi - lo) / bin_width).ceil() as usize;
    debug!("scott's rule: n={} width={:.4e} bins={}", n, bin_width, k);
    Ok(k)
}

/// Bin edges for a step histogram of posterior samples: `k` points spread
/// evenly between the sample minimum and maximum, `k` from Scott's rule.
pub fn scotts_rule_bins(samples: &[f64]) -> Result<Vec<f64>> {
    let k = scotts_rule_bin_count(samples)?.max(2);
    let (lo, hi) = min_max(samples).unwrap_or((0.0, 0.0));
    Ok(linspace(lo, hi, k))
}

/// Per-column mean and 16th/84th percentiles of a `[sample, bin]` array.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

pub fn column_summary(samples: ArrayView2<f64>) -> Result<ColumnSummary> {
    if samples.nrows() == 0 {
        return invalid("no samples to summarize");
    }
    let mut out = ColumnSummary {
        mean: Vec::with_capacity(samples.ncols()),
        lower: Vec::with_capacity(samples.ncols()),
        upper: Vec::with_capacity(samples.ncols()),
    };
    for col in samples.axis_iter(Axis(1)) {
        let values = col.to_vec();
        out.mean.push(mean(&values).unwrap_or(f64::NAN));
        out.lower.push(percentile(&values, 16.0).unwrap_or(f64::NAN));
        out.upper.push(percentile(&values, 84.0).unwrap_or(f64::NAN));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(4.0));
        assert!((percentile(&values, 50.0).unwrap() - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 25.0).unwrap() - 1.75).abs() < 1e-12);
    }

    #[test]
    fn percentile_skips_nan() {
        let values = vec![f64::NAN, 1.0, 3.0];
        assert_eq!(median(&values), Some(2.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn linspace_hits_both_ends() {
        let v = linspace(-1.0, 1.0, 5);
        assert_eq!(v, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn histogram_uses_half_open_bins_with_closed_last_bin() {
        let edges = vec![0.0, 1.0, 2.0, 3.0];
        let counts = histogram(&[0.0, 0.5, 1.0, 2.5, 3.0, 3.1, -0.1, f64::NAN], &edges).unwrap();
        assert_eq!(counts, vec![2, 1, 2]);
    }

    #[test]
    fn histogram_rejects_unsorted_edges() {
        assert!(histogram(&[1.0], &[0.0, 2.0, 1.0]).is_err());
        assert!(histogram(&[1.0], &[0.0]).is_err());
    }

    #[test]
    fn density_integrates_to_one() {
        let edges = vec![0.0, 0.5, 2.0];
        let counts = vec![3, 1];
        let d = density(&counts, &edges);
        let integral: f64 = d.iter().zip(edges.windows(2)).map(|(p, w)| p * (w[1] - w[0])).sum();
        assert!((integral - 1.0).abs() < 1e-12);
    }

    #[test]
    fn scotts_rule_matches_hand_computation() {
        let samples: Vec<f64> = (0..8).map(|i| i as f64).collect();
        // sigma = sqrt(5.25), n^(1/3) = 2
        let width = 3.5 * 5.25f64.sqrt() / 2.0;
        let expected = (7.0 / width).ceil() as usize;
        assert_eq!(scotts_rule_bin_count(&samples).unwrap(), expected);
        let edges = scotts_rule_bins(&samples).unwrap();
        assert_eq!(edges.len(), expected.max(2));
        assert_eq!(edges[0], 0.0);
        assert_eq!(*edges.last().unwrap(), 7.0);
    }

    #[test]
    fn scotts_rule_fewer_bins_for_wider_spread() {
        // Same range [0, 10] and sample count; the second set is more spread out.
        let mut narrow = vec![0.0, 10.0];
        narrow.extend(std::iter::repeat(5.0).take(98));
        let mut wide = vec![0.0, 10.0];
        wide.extend((0..98).map(|i| i as f64 * 10.0 / 97.0));

        let k_narrow = scotts_rule_bin_count(&narrow).unwrap();
        let k_wide = scotts_rule_bin_count(&wide).unwrap();
        assert!(k_narrow >= k_wide, "{} < {}", k_narrow, k_wide);
    }

    #[test]
    fn scotts_rule_more_bins_for_more_samples() {
        let base: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin()).collect();
        let doubled: Vec<f64> = base.iter().chain(base.iter()).copied().collect();
        // Duplicating the set keeps sigma and range fixed while doubling n.
        assert!(scotts_rule_bin_count(&doubled).unwrap() >= scotts_rule_bin_count(&base).unwrap());
    }

    #[test]
    fn scotts_rule_rejects_degenerate_samples() {
        assert!(scotts_rule_bins(&[1.0]).is_err());
        assert!(scotts_rule_bins(&[2.0, 2.0, 2.0]).is_err());
        assert!(scotts_rule_bins(&[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn equal_width_edges_widens_constant_samples() {
        let edges = equal_width_edges(&[3.0, 3.0], 2).unwrap();
        assert_eq!(edges, vec![2.5, 3.0, 3.5]);
    }

    #[test]
    fn column_summary_reports_mean_and_band() {
        let samples = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let summary = column_summary(samples.view()).unwrap();
        assert_eq!(summary.mean, vec![2.0, 20.0]);
        assert!((summary.lower[0] - 1.32).abs() < 1e-12);
        assert!((summary.upper[1] - 26.8).abs() < 1e-12);
    }
}
