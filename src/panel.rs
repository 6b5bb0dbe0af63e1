//! Handoff to the rendering collaborator.
//!
//! The pipeline does not draw pixels. It truncates the sorted table to a
//! displayable subset, formats per-feature annotation strings, and hands a
//! [`PanelData`] to whatever [`PanelRenderer`] the caller injects. The crate
//! ships a TSV writer so the binary produces an inspectable artifact without
//! any plotting backend.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use ndarray::Array2;

use crate::associate::Association;
use crate::error::AssocError;
use crate::matrix::ValueType;
use crate::selection::{self, Selection};

/// Display strings for one panel row. Skipped stages show fixed
/// placeholders instead of numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelAnnotation {
    pub score_moe: String,
    pub p_value: String,
    pub fdr: String,
}

/// Everything a renderer needs: the aligned target, the truncated feature
/// block in sort order, value-type tags, and formatted annotations.
#[derive(Debug, Clone)]
pub struct PanelData {
    pub title: String,
    pub target_name: String,
    pub samples: Vec<String>,
    pub target_values: Vec<f64>,
    pub target_type: ValueType,
    pub features_type: ValueType,
    pub feature_names: Vec<String>,
    pub feature_values: Array2<f64>,
    pub annotations: Vec<PanelAnnotation>,
}

/// A rendering collaborator. Implementations draw heatmaps, write text,
/// or anything else; the pipeline only guarantees the data contract.
pub trait PanelRenderer {
    fn render(&self, panel: &PanelData) -> Result<(), AssocError>;
}

/// Truncate an association result to its displayable subset and format the
/// annotation strings.
pub fn build_panel(
    association: &Association,
    display: &Selection,
    target_type: ValueType,
    features_type: ValueType,
    title: impl Into<String>,
) -> PanelData {
    let table = &association.table;
    let sorted_scores: Vec<f64> = table.records.iter().map(|r| r.score).collect();
    let keep = selection::panel_rows(display, &sorted_scores);

    let truncated = association.features.select_rows(&keep);
    let annotations = keep
        .iter()
        .map(|&i| {
            let record = &table.records[i];
            PanelAnnotation {
                score_moe: format_score_moe(record.score, record.moe),
                p_value: format_significance(record.p_value),
                fdr: format_significance(record.fdr),
            }
        })
        .collect();

    PanelData {
        title: title.into(),
        target_name: association.target.name.clone(),
        samples: association.target.samples.clone(),
        target_values: association.target.values.to_vec(),
        target_type,
        features_type,
        feature_names: truncated.rows,
        feature_values: truncated.values,
        annotations,
    }
}

fn format_score_moe(score: f64, moe: Option<f64>) -> String {
    match moe {
        Some(moe) => format!("{:.3}({:.3})", score, moe),
        None => format!("{:.3}(x.xxx)", score),
    }
}

fn format_significance(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.2e}", value),
        None => "x.xxe\u{00B1}xx".to_string(),
    }
}

/// Writes the panel as tab-separated text: the target row first, then one
/// row per feature with its annotation columns.
pub struct TsvPanelWriter {
    pub path: PathBuf,
}

impl PanelRenderer for TsvPanelWriter {
    fn render(&self, panel: &PanelData) -> Result<(), AssocError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        writeln!(writer, "# {}", panel.title)?;

        // empty corner cell, then sample identifiers
        for sample in &panel.samples {
            write!(writer, "\t{}", sample)?;
        }
        writeln!(writer, "\tscore(moe)\tp-value\tfdr")?;

        write!(writer, "{}", panel.target_name)?;
        for value in &panel.target_values {
            write!(writer, "\t{}", value)?;
        }
        writeln!(writer, "\t\t\t")?;

        for (i, name) in panel.feature_names.iter().enumerate() {
            write!(writer, "{}", name)?;
            for value in panel.feature_values.row(i).iter() {
                write!(writer, "\t{}", value)?;
            }
            let annotation = &panel.annotations[i];
            writeln!(
                writer,
                "\t{}\t{}\t{}",
                annotation.score_moe, annotation.p_value, annotation.fdr
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::associate::{associate, AssociationConfig};
    use crate::matrix::{NamedMatrix, Target};
    use crate::observer::SilentObserver;
    use crate::scoring::Pearson;
    use ndarray::{array, Array2};

    fn association(n_features: usize) -> Association {
        let samples: Vec<String> = (0..6).map(|i| format!("s{i}")).collect();
        let target = Target::new(
            "t",
            samples.clone(),
            array![6.0, 5.0, 4.0, 3.0, 2.0, 1.0],
        )
        .unwrap();
        let rows: Vec<String> = (0..n_features).map(|i| format!("f{i}")).collect();
        let mut values = Array2::zeros((n_features, 6));
        for i in 0..n_features {
            for j in 0..6 {
                values[[i, j]] = ((i + 1) * (6 - j)) as f64 + (i % 3) as f64 * j as f64;
            }
        }
        let features = NamedMatrix::new(rows, samples, values).unwrap();
        let config = AssociationConfig {
            seed: Some(5),
            n_permutations: 0,
            n_samplings: 0,
            ..AssociationConfig::default()
        };
        associate(&target, &features, &Pearson, &config, &SilentObserver).unwrap()
    }

    #[test]
    fn placeholders_mark_skipped_stages() {
        let panel = build_panel(
            &association(4),
            &Selection::Count(2),
            ValueType::Continuous,
            ValueType::Continuous,
            "t vs demo",
        );
        assert!(panel.annotations[0].score_moe.ends_with("(x.xxx)"));
        assert_eq!(panel.annotations[0].p_value, "x.xxe\u{00B1}xx");
        assert_eq!(panel.annotations[0].fdr, "x.xxe\u{00B1}xx");
    }

    #[test]
    fn truncation_keeps_top_and_bottom_in_order() {
        let result = association(10);
        let panel = build_panel(
            &result,
            &Selection::Count(2),
            ValueType::Continuous,
            ValueType::Continuous,
            "t vs demo",
        );
        assert_eq!(panel.feature_names.len(), 4);
        assert_eq!(panel.feature_names[0], result.table.records[0].feature);
        assert_eq!(
            panel.feature_names[3],
            result.table.records[9].feature
        );
        assert_eq!(panel.annotations.len(), 4);
    }

    #[test]
    fn formatted_values_use_three_decimals() {
        assert_eq!(format_score_moe(0.51234, Some(0.0456)), "0.512(0.046)");
        assert_eq!(format_score_moe(-1.0, None), "-1.000(x.xxx)");
    }
}
