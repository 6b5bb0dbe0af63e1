//! Feature-target association panels.
//!
//! Scores every row of a feature-by-sample matrix against one target
//! variable with a pluggable measure, ranks the features, estimates score
//! uncertainty by bootstrap resampling, and estimates significance by
//! permutation testing with Benjamini-Hochberg correction. Heavy stages
//! fan out over a rayon-backed partitioner when chunk sizes justify it;
//! results are identical for any worker count.

pub mod associate;
pub mod bootstrap;
pub mod bundle;
pub mod error;
pub mod matrix;
pub mod observer;
pub mod panel;
pub mod partition;
pub mod permutation;
pub mod scoring;
pub mod selection;
pub mod stats;

pub use associate::{associate, Association, AssociationConfig, FeatureScore, ScoreTable};
pub use error::AssocError;
pub use matrix::{NamedMatrix, Target, ValueType};
pub use observer::{LogObserver, SilentObserver, Stage, StageObserver};
pub use partition::Partitioner;
pub use scoring::{metric_by_name, Pearson, ScoreFunction, Spearman};
pub use selection::Selection;
