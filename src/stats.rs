//! Small statistical helpers shared by the bootstrap and permutation stages.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::AssocError;

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1); 0.0 with fewer than 2 values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Linear-interpolation quantile of `values` at `q` in [0, 1].
pub fn quantile(values: &[f64], q: f64) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q = q.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Standard normal quantile at probability `p` (one-sided convention, so
/// `p = 0.95` yields roughly 1.645).
pub fn normal_quantile(p: f64) -> Result<f64, AssocError> {
    if !(p > 0.0 && p < 1.0) {
        return Err(AssocError::InvalidConfiguration(format!(
            "confidence level must lie in (0, 1); got {}",
            p
        )));
    }
    let standard = Normal::new(0.0, 1.0)
        .map_err(|e| AssocError::InvalidConfiguration(format!("standard normal: {}", e)))?;
    Ok(standard.inverse_cdf(p))
}

/// Benjamini-Hochberg adjusted p-values, in the input order.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let mut adjusted = vec![0.0; n];
    let mut running_min = 1.0f64;
    for (rank, &i) in order.iter().enumerate().rev() {
        let raw = p_values[i] * n as f64 / (rank + 1) as f64;
        running_min = running_min.min(raw.min(1.0));
        adjusted[i] = running_min;
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_std_matches_hand_computation() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // variance = 32 / 7
        assert!((sample_std(&values) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(sample_std(&[1.0]), 0.0);
    }

    #[test]
    fn quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn normal_quantile_is_one_sided() {
        let z = normal_quantile(0.95).unwrap();
        assert!((z - 1.6448536).abs() < 1e-4);
        assert!(normal_quantile(1.0).is_err());
        assert!(normal_quantile(0.0).is_err());
    }

    #[test]
    fn benjamini_hochberg_known_values() {
        let p = [0.01, 0.04, 0.03, 0.005];
        let adj = benjamini_hochberg(&p);
        // ranks (ascending): 0.005, 0.01, 0.03, 0.04
        assert!((adj[3] - 0.02).abs() < 1e-12);
        assert!((adj[0] - 0.02).abs() < 1e-12);
        assert!((adj[2] - 0.04).abs() < 1e-12);
        assert!((adj[1] - 0.04).abs() < 1e-12);
    }

    #[test]
    fn benjamini_hochberg_is_monotone_and_capped() {
        let p = [0.9, 0.95, 0.99, 1.0];
        let adj = benjamini_hochberg(&p);
        assert!(adj.iter().all(|&v| v <= 1.0));
        let mut sorted = adj.to_vec();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(sorted.last().copied().unwrap(), 1.0);
    }
}
