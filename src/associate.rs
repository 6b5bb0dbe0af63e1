//! The association orchestrator: align, filter, score, sort, then the
//! skippable bootstrap and permutation stages, merged into one table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::bootstrap::{self, BootstrapConfig};
use crate::error::AssocError;
use crate::matrix::{self, NamedMatrix, Target};
use crate::observer::{Stage, StageObserver};
use crate::partition::{Partitioner, DEFAULT_MIN_CHUNK};
use crate::permutation;
use crate::scoring::{score_range, ScoreFunction};
use crate::selection::Selection;

/// Feature rows need at least this many distinct values to carry signal.
pub const MIN_UNIQUE_VALUES: usize = 2;

#[derive(Debug, Clone)]
pub struct AssociationConfig {
    /// Worker count for the partitioner; 1 disables parallel dispatch.
    pub n_jobs: usize,
    /// Minimum features per worker below which a stage runs sequentially.
    pub min_per_job: usize,
    /// Which features get a bootstrap margin of error; `None` skips the
    /// stage.
    pub ci_selection: Option<Selection>,
    /// Bootstrap rounds; fewer than 2 skips the stage.
    pub n_samplings: usize,
    /// Confidence level for the margin of error.
    pub confidence: f64,
    /// Permutation rounds; fewer than 1 skips the stage.
    pub n_permutations: usize,
    /// Sort scores ascending instead of descending.
    pub ascending: bool,
    /// RNG seed for resampling and shuffling; random when absent.
    pub seed: Option<u64>,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            n_jobs: 1,
            min_per_job: DEFAULT_MIN_CHUNK,
            ci_selection: Some(Selection::Fraction(0.95)),
            n_samplings: 30,
            confidence: 0.95,
            n_permutations: 30,
            ascending: false,
            seed: None,
        }
    }
}

/// One retained feature's merged outputs. Optional columns stay `None` when
/// their stage was skipped (or, for `moe`, when the feature was outside the
/// bootstrap selection).
#[derive(Debug, Clone)]
pub struct FeatureScore {
    pub feature: String,
    pub score: f64,
    pub moe: Option<f64>,
    pub p_value: Option<f64>,
    pub fdr_forward: Option<f64>,
    pub fdr_reverse: Option<f64>,
    pub fdr: Option<f64>,
}

/// The merged result table, in final score-sort order. That order is
/// load-bearing: every later top/bottom-N selection reads it.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    pub confidence: f64,
    pub records: Vec<FeatureScore>,
}

impl ScoreTable {
    /// True if the bootstrap stage ran for any feature.
    pub fn has_moe(&self) -> bool {
        self.records.iter().any(|r| r.moe.is_some())
    }

    /// True if the permutation stage ran.
    pub fn has_significance(&self) -> bool {
        self.records.iter().any(|r| r.p_value.is_some())
    }

    /// Write the table as tab-separated text, one row per feature in sort
    /// order. Columns for skipped stages are omitted entirely.
    pub fn write_tsv(&self, path: &Path) -> Result<(), AssocError> {
        let mut writer = BufWriter::new(File::create(path)?);
        let moe = self.has_moe();
        let significance = self.has_significance();

        write!(writer, "feature\tscore")?;
        if moe {
            write!(writer, "\t{} moe", self.confidence)?;
        }
        if significance {
            write!(writer, "\tp-value\tfdr (forward)\tfdr (reverse)\tfdr")?;
        }
        writeln!(writer)?;

        for record in &self.records {
            write!(writer, "{}\t{:.6}", record.feature, record.score)?;
            if moe {
                match record.moe {
                    Some(value) => write!(writer, "\t{:.6}", value)?,
                    None => write!(writer, "\tNA")?,
                }
            }
            if significance {
                for value in [
                    record.p_value,
                    record.fdr_forward,
                    record.fdr_reverse,
                    record.fdr,
                ] {
                    match value {
                        Some(value) => write!(writer, "\t{:.6e}", value)?,
                        None => write!(writer, "\tNA")?,
                    }
                }
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

/// Everything one association run produces: the aligned target, the
/// filtered feature matrix in final sort order, and the merged table.
#[derive(Debug, Clone)]
pub struct Association {
    pub target: Target,
    pub features: NamedMatrix,
    pub table: ScoreTable,
}

/// Run the pipeline: ALIGN -> FILTER -> SCORE -> SORT -> [BOOTSTRAP] ->
/// [PERMUTE]. Fatal errors abort before anything is returned; stage skips
/// are reported to `observer` and leave their columns absent.
pub fn associate(
    target: &Target,
    features: &NamedMatrix,
    function: &dyn ScoreFunction,
    config: &AssociationConfig,
    observer: &dyn StageObserver,
) -> Result<Association, AssocError> {
    let partitioner = Partitioner::new(config.n_jobs.max(1), config.min_per_job);

    observer.stage_started(
        Stage::Align,
        &format!(
            "target {} ({} samples) against {} features ({} samples)",
            target.name,
            target.len(),
            features.nrows(),
            features.ncols()
        ),
    );
    let (target, features) = matrix::align(target, features)?;
    observer.stage_finished(
        Stage::Align,
        &format!("{} shared samples", target.len()),
    );

    let (features, dropped) = matrix::drop_degenerate(&features, MIN_UNIQUE_VALUES)?;
    observer.stage_finished(
        Stage::Filter,
        &format!("kept {} features, dropped {} degenerate", features.nrows(), dropped),
    );

    observer.stage_started(
        Stage::Score,
        &format!(
            "scoring {} features ({} workers)",
            features.nrows(),
            partitioner.workers()
        ),
    );
    let scores = partitioner.map_chunks(features.nrows(), |range| {
        score_range(&target.values, &features, function, range)
    });
    observer.stage_finished(Stage::Score, &format!("{} scores", scores.len()));

    let mut order: Vec<usize> = (0..scores.len()).collect();
    if config.ascending {
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    } else {
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    }
    let features = features.select_rows(&order);
    let sorted_scores: Vec<f64> = order.iter().map(|&i| scores[i]).collect();
    observer.stage_finished(
        Stage::Sort,
        if config.ascending { "ascending by score" } else { "descending by score" },
    );

    let mut records: Vec<FeatureScore> = features
        .rows
        .iter()
        .zip(&sorted_scores)
        .map(|(feature, &score)| FeatureScore {
            feature: feature.clone(),
            score,
            moe: None,
            p_value: None,
            fdr_forward: None,
            fdr_reverse: None,
            fdr: None,
        })
        .collect();

    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_os_rng(),
    };

    let bootstrap_config = BootstrapConfig {
        n_samplings: config.n_samplings,
        confidence: config.confidence,
    };
    match &config.ci_selection {
        None => observer.stage_skipped(Stage::Bootstrap, "no selection policy"),
        Some(selection) => {
            if let Some(reason) = bootstrap::skip_reason(&bootstrap_config, target.len()) {
                observer.stage_skipped(Stage::Bootstrap, &reason);
            } else {
                let selected = selection.pick(&sorted_scores);
                observer.stage_started(
                    Stage::Bootstrap,
                    &format!(
                        "{} rounds over {} selected features at confidence {}",
                        config.n_samplings,
                        selected.len(),
                        config.confidence
                    ),
                );
                let moes = bootstrap::margins_of_error(
                    &target.values,
                    &features,
                    &selected,
                    &bootstrap_config,
                    function,
                    &partitioner,
                    &mut rng,
                )?;
                for (&position, moe) in selected.iter().zip(moes) {
                    records[position].moe = Some(moe);
                }
                observer.stage_finished(Stage::Bootstrap, &format!("{} margins", selected.len()));
            }
        }
    }

    if let Some(reason) = permutation::skip_reason(config.n_permutations) {
        observer.stage_skipped(Stage::Permutation, &reason);
    } else {
        observer.stage_started(
            Stage::Permutation,
            &format!("{} permuted targets", config.n_permutations),
        );
        let outcome = permutation::permutation_test(
            &target.values,
            &features,
            &sorted_scores,
            config.n_permutations,
            function,
            &partitioner,
            &mut rng,
        );
        for (i, record) in records.iter_mut().enumerate() {
            record.p_value = Some(outcome.p_values[i]);
            record.fdr_forward = Some(outcome.fdr_forward[i]);
            record.fdr_reverse = Some(outcome.fdr_reverse[i]);
            record.fdr = Some(outcome.fdr[i]);
        }
        observer.stage_finished(
            Stage::Permutation,
            &format!("{} p-values", records.len()),
        );
    }

    Ok(Association {
        target,
        features,
        table: ScoreTable {
            confidence: config.confidence,
            records,
        },
    })
}
