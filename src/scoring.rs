//! Pluggable scoring and the row-wise scorer.
//!
//! The association measure is an injected capability, never hard-coded: any
//! [`ScoreFunction`] over two equal-length numeric vectors plugs into the
//! pipeline. Pearson and Spearman correlation ship with the crate so the
//! binary runs end to end.

use ndarray::{Array1, ArrayView1};

use crate::error::AssocError;
use crate::matrix::NamedMatrix;

/// A similarity or information measure over two equal-length numeric vectors
/// with at least 2 distinct values each. May be symmetric or asymmetric; the
/// pipeline always calls it as `score(target, feature)`.
pub trait ScoreFunction: Sync {
    fn score(&self, target: ArrayView1<'_, f64>, feature: ArrayView1<'_, f64>) -> f64;
}

impl<F> ScoreFunction for F
where
    F: Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64 + Sync,
{
    fn score(&self, target: ArrayView1<'_, f64>, feature: ArrayView1<'_, f64>) -> f64 {
        self(target, feature)
    }
}

/// Pearson product-moment correlation. Returns 0.0 when either vector has
/// zero variance (a bootstrap draw can make any vector constant).
pub struct Pearson;

impl ScoreFunction for Pearson {
    fn score(&self, target: ArrayView1<'_, f64>, feature: ArrayView1<'_, f64>) -> f64 {
        pearson(target, feature)
    }
}

/// Spearman rank correlation: Pearson over average-tie ranks.
pub struct Spearman;

impl ScoreFunction for Spearman {
    fn score(&self, target: ArrayView1<'_, f64>, feature: ArrayView1<'_, f64>) -> f64 {
        let ra = Array1::from_vec(ranks(target));
        let rb = Array1::from_vec(ranks(feature));
        pearson(ra.view(), rb.view())
    }
}

/// Look up a shipped measure by CLI name.
pub fn metric_by_name(name: &str) -> Result<Box<dyn ScoreFunction>, AssocError> {
    match name {
        "pearson" => Ok(Box::new(Pearson)),
        "spearman" => Ok(Box::new(Spearman)),
        other => Err(AssocError::InvalidConfiguration(format!(
            "unknown metric '{}'; expected pearson or spearman",
            other
        ))),
    }
}

/// Score every feature row against the aligned target, preserving row order.
/// Row length equals target length by the alignment invariant.
pub fn score_rows(
    target: &Array1<f64>,
    features: &NamedMatrix,
    function: &dyn ScoreFunction,
) -> Vec<f64> {
    score_range(target, features, function, 0..features.nrows())
}

/// Score a contiguous row range; the unit of work handed to the partitioner.
pub fn score_range(
    target: &Array1<f64>,
    features: &NamedMatrix,
    function: &dyn ScoreFunction,
    range: std::ops::Range<usize>,
) -> Vec<f64> {
    range
        .map(|i| function.score(target.view(), features.values.row(i)))
        .collect()
}

fn pearson(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Average ranks (1-based), ties sharing the mean of their positions.
fn ranks(values: ArrayView1<'_, f64>) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut out = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            out[i] = rank;
        }
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn pearson_detects_perfect_correlation() {
        let a = array![1.0, 2.0, 3.0, 4.0];
        let up = array![2.0, 4.0, 6.0, 8.0];
        let down = array![8.0, 6.0, 4.0, 2.0];
        assert!((Pearson.score(a.view(), up.view()) - 1.0).abs() < 1e-12);
        assert!((Pearson.score(a.view(), down.view()) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_zero_variance_scores_zero() {
        let a = array![1.0, 2.0, 3.0];
        let flat = array![5.0, 5.0, 5.0];
        assert_eq!(Pearson.score(a.view(), flat.view()), 0.0);
    }

    #[test]
    fn spearman_is_rank_based() {
        let a = array![1.0, 2.0, 3.0, 4.0];
        let b = array![1.0, 10.0, 100.0, 1000.0]; // monotone, nonlinear
        assert!((Spearman.score(a.view(), b.view()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ranks_average_ties() {
        let r = ranks(array![3.0, 1.0, 3.0, 2.0].view());
        assert_eq!(r, vec![3.5, 1.0, 3.5, 2.0]);
    }

    #[test]
    fn closures_plug_in() {
        let matrix = NamedMatrix::new(
            vec!["f".to_string()],
            vec!["a".to_string(), "b".to_string()],
            array![[1.0, 2.0]],
        )
        .unwrap();
        let target = array![1.0, 2.0];
        let diff = |t: ArrayView1<'_, f64>, f: ArrayView1<'_, f64>| t[0] - f[1];
        let scores = score_rows(&target, &matrix, &diff);
        assert_eq!(scores, vec![-1.0]);
    }

    #[test]
    fn unknown_metric_is_rejected() {
        assert!(metric_by_name("cosine").is_err());
    }
}
