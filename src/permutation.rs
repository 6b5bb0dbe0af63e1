//! Permutation testing: empirical p-values against a pooled null, with
//! two-sided Benjamini-Hochberg correction.
//!
//! Each round fully shuffles the target's values (same multiset, sample-key
//! order unchanged) and scores every feature against the shuffled target.
//! All n x P null scores are pooled into one distribution; pooling assumes
//! features are exchangeable under the null and buys resolution in return.

use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::matrix::NamedMatrix;
use crate::partition::Partitioner;
use crate::scoring::ScoreFunction;
use crate::stats;

/// Per-feature significance columns, in the same row order as the scores
/// passed to [`permutation_test`].
#[derive(Debug, Clone)]
pub struct PermutationOutcome {
    /// Empirical p-values in (0, 1]; never exactly zero (the floor is
    /// `1 / (n_features * n_permutations)`).
    pub p_values: Vec<f64>,
    /// Benjamini-Hochberg over the p-values.
    pub fdr_forward: Vec<f64>,
    /// Benjamini-Hochberg over `1 - p`; guards against the pooled null
    /// being skewed toward one tail.
    pub fdr_reverse: Vec<f64>,
    /// `min(forward, reverse)` per feature.
    pub fdr: Vec<f64>,
}

/// Why the stage will not run, if its precondition is unmet.
pub fn skip_reason(n_permutations: usize) -> Option<String> {
    if n_permutations < 1 {
        Some(format!(
            "fewer than 1 permutation (n_permutations={})",
            n_permutations
        ))
    } else {
        None
    }
}

/// Score every feature against `n_permutations` shuffled targets and derive
/// p-values and FDRs for `scores` (which must be in the same row order as
/// `features`).
///
/// Shuffles are generated sequentially from `rng` before any dispatch, so
/// the outcome is identical for every worker count.
pub fn permutation_test<R: Rng>(
    target: &Array1<f64>,
    features: &NamedMatrix,
    scores: &[f64],
    n_permutations: usize,
    function: &dyn ScoreFunction,
    partitioner: &Partitioner,
    rng: &mut R,
) -> PermutationOutcome {
    let n_features = features.nrows();

    let mut values: Vec<f64> = target.to_vec();
    let shuffled_targets: Vec<Array1<f64>> = (0..n_permutations)
        .map(|_| {
            values.shuffle(rng);
            Array1::from_vec(values.clone())
        })
        .collect();

    let null_rows: Vec<Vec<f64>> = partitioner.map_chunks(n_features, |range| {
        range
            .map(|i| {
                let row = features.values.row(i);
                shuffled_targets
                    .iter()
                    .map(|shuffled| function.score(shuffled.view(), row))
                    .collect()
            })
            .collect()
    });

    let mut pooled: Vec<f64> = null_rows.into_iter().flatten().collect();
    pooled.sort_by(f64::total_cmp);

    let total = (n_features * n_permutations) as f64;
    let floor = 1.0 / total;
    let p_values: Vec<f64> = scores
        .iter()
        .map(|&score| {
            let greater = pooled.len() - pooled.partition_point(|&null| null <= score);
            let p = greater as f64 / total;
            if p == 0.0 {
                floor
            } else {
                p
            }
        })
        .collect();

    let fdr_forward = stats::benjamini_hochberg(&p_values);
    let complements: Vec<f64> = p_values.iter().map(|p| 1.0 - p).collect();
    let fdr_reverse = stats::benjamini_hochberg(&complements);
    let fdr = fdr_forward
        .iter()
        .zip(&fdr_reverse)
        .map(|(f, r)| f.min(*r))
        .collect();

    PermutationOutcome {
        p_values,
        fdr_forward,
        fdr_reverse,
        fdr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{score_rows, Pearson};
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn features() -> NamedMatrix {
        NamedMatrix::new(
            vec!["up".into(), "down".into()],
            (0..6).map(|i| format!("s{i}")).collect(),
            array![
                [6.0, 5.0, 4.0, 3.0, 2.0, 1.0],
                [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
            ],
        )
        .unwrap()
    }

    fn run(workers: usize) -> PermutationOutcome {
        let target = array![6.0, 5.0, 4.0, 3.0, 2.0, 1.0];
        let features = features();
        let scores = score_rows(&target, &features, &Pearson);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        permutation_test(
            &target,
            &features,
            &scores,
            30,
            &Pearson,
            &Partitioner::new(workers, 1),
            &mut rng,
        )
    }

    #[test]
    fn p_values_are_floored_never_zero() {
        let outcome = run(1);
        let floor = 1.0 / (2.0 * 30.0);
        assert!(outcome.p_values.iter().all(|&p| p >= floor && p <= 1.0));
        // the perfectly correlated feature beats every null score
        assert!((outcome.p_values[0] - floor).abs() < 1e-12);
    }

    #[test]
    fn combined_fdr_is_the_minimum() {
        let outcome = run(1);
        for i in 0..outcome.fdr.len() {
            let forward = outcome.fdr_forward[i];
            let reverse = outcome.fdr_reverse[i];
            assert_eq!(outcome.fdr[i], forward.min(reverse));
            assert!(outcome.fdr[i] <= forward.max(reverse));
        }
    }

    #[test]
    fn outcome_is_identical_for_any_worker_count() {
        let reference = run(1);
        for workers in [2usize, 3, 5] {
            let outcome = run(workers);
            assert_eq!(outcome.p_values, reference.p_values, "workers={workers}");
            assert_eq!(outcome.fdr, reference.fdr, "workers={workers}");
        }
    }

    #[test]
    fn zero_permutations_skip() {
        assert!(skip_reason(0).is_some());
        assert!(skip_reason(1).is_none());
    }
}
