//! Bootstrap margin-of-error estimation for selected features.
//!
//! Each round draws `ceil(0.632 * m)` sample positions with replacement;
//! the draw is shared by every selected feature so all per-feature score
//! distributions come from the same resampled sample sets. The margin of
//! error at confidence `c` is `z(c) * sample_std / sqrt(R)` with `z` the
//! one-sided standard normal quantile.

use ndarray::{Array1, Axis};
use rand::Rng;

use crate::error::AssocError;
use crate::matrix::NamedMatrix;
use crate::partition::Partitioner;
use crate::scoring::ScoreFunction;
use crate::stats;

/// Fraction of the sample population drawn per bootstrap round.
pub const RESAMPLE_FRACTION: f64 = 0.632;

#[derive(Debug, Clone, Copy)]
pub struct BootstrapConfig {
    /// Number of bootstrap rounds R; must be at least 2 to build a
    /// distribution.
    pub n_samplings: usize,
    /// Confidence level for the margin of error, in (0, 1).
    pub confidence: f64,
}

/// Samples drawn per round for a population of `n_samples`.
pub fn resample_size(n_samples: usize) -> usize {
    (RESAMPLE_FRACTION * n_samples as f64).ceil() as usize
}

/// Why the stage will not run, if any precondition is unmet.
pub fn skip_reason(config: &BootstrapConfig, n_samples: usize) -> Option<String> {
    if config.n_samplings < 2 {
        return Some(format!(
            "fewer than 2 resamplings (n_samplings={})",
            config.n_samplings
        ));
    }
    let size = resample_size(n_samples);
    if size < 3 {
        return Some(format!(
            "resample size {} below 3 ({} shared samples)",
            size, n_samples
        ));
    }
    None
}

/// Margin of error for each row position in `selected`, in that order.
///
/// Draws are generated sequentially from `rng` before any dispatch, so the
/// result is identical for every worker count.
pub fn margins_of_error<R: Rng>(
    target: &Array1<f64>,
    features: &NamedMatrix,
    selected: &[usize],
    config: &BootstrapConfig,
    function: &dyn ScoreFunction,
    partitioner: &Partitioner,
    rng: &mut R,
) -> Result<Vec<f64>, AssocError> {
    let population = target.len();
    let size = resample_size(population);
    let z = stats::normal_quantile(config.confidence)?;
    let scale = (config.n_samplings as f64).sqrt();

    let draws: Vec<Vec<usize>> = (0..config.n_samplings)
        .map(|_| (0..size).map(|_| rng.random_range(0..population)).collect())
        .collect();
    let resampled_targets: Vec<Array1<f64>> = draws
        .iter()
        .map(|draw| target.select(Axis(0), draw))
        .collect();

    Ok(partitioner.map_chunks(selected.len(), |range| {
        range
            .map(|s| {
                let row = features.values.row(selected[s]);
                let round_scores: Vec<f64> = draws
                    .iter()
                    .zip(&resampled_targets)
                    .map(|(draw, resampled_target)| {
                        let resampled_row = row.select(Axis(0), draw);
                        function.score(resampled_target.view(), resampled_row.view())
                    })
                    .collect();
                z * (stats::sample_std(&round_scores) / scale)
            })
            .collect()
    }))
}
