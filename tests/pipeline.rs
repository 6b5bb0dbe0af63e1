//! End-to-end runs of the association pipeline through the public API,
//! including file round trips for the readers and the score table writer.

use std::fs;
use std::path::PathBuf;

use ndarray::array;

use assoc_panel::associate::{associate, AssociationConfig};
use assoc_panel::bundle;
use assoc_panel::matrix::{self, NamedMatrix, Target};
use assoc_panel::observer::SilentObserver;
use assoc_panel::scoring::Pearson;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("assoc_panel_test_{}_{}", std::process::id(), name))
}

fn five_sample_target() -> Target {
    Target::new(
        "phenotype",
        vec!["A".into(), "B".into(), "C".into(), "D".into(), "E".into()],
        array![5.0, 4.0, 3.0, 2.0, 1.0],
    )
    .unwrap()
}

fn two_feature_matrix() -> NamedMatrix {
    NamedMatrix::new(
        vec!["F1".into(), "F2".into()],
        vec!["A".into(), "B".into(), "C".into(), "D".into(), "E".into()],
        array![[5.0, 4.0, 3.0, 2.0, 1.0], [1.0, 2.0, 3.0, 4.0, 5.0]],
    )
    .unwrap()
}

#[test]
fn perfectly_correlated_feature_wins_and_hits_the_p_value_floor() {
    let config = AssociationConfig {
        seed: Some(42),
        ..AssociationConfig::default()
    };
    let result = associate(
        &five_sample_target(),
        &two_feature_matrix(),
        &Pearson,
        &config,
        &SilentObserver,
    )
    .unwrap();

    let records = &result.table.records;
    assert_eq!(records[0].feature, "F1");
    assert_eq!(records[1].feature, "F2");

    let floor = 1.0 / (30.0 * 2.0);
    let p1 = records[0].p_value.unwrap();
    assert!(p1 >= floor, "p-value below the floor: {p1}");
    assert!(p1 <= 3.0 * floor, "perfect score should sit at or near the floor: {p1}");

    for record in records {
        let p = record.p_value.unwrap();
        assert!(p > 0.0 && p <= 1.0);
        let forward = record.fdr_forward.unwrap();
        let reverse = record.fdr_reverse.unwrap();
        assert_eq!(record.fdr.unwrap(), forward.min(reverse));
    }
}

#[test]
fn score_table_round_trips_through_tsv() {
    let config = AssociationConfig {
        seed: Some(1),
        ..AssociationConfig::default()
    };
    let result = associate(
        &five_sample_target(),
        &two_feature_matrix(),
        &Pearson,
        &config,
        &SilentObserver,
    )
    .unwrap();

    let path = temp_path("scores.tsv");
    result.table.write_tsv(&path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    fs::remove_file(&path).ok();

    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert_eq!(
        header,
        "feature\tscore\t0.95 moe\tp-value\tfdr (forward)\tfdr (reverse)\tfdr"
    );
    let body: Vec<&str> = lines.collect();
    assert_eq!(body.len(), 2);
    assert!(body[0].starts_with("F1\t"));
    assert!(body[1].starts_with("F2\t"));
}

#[test]
fn skipped_stages_write_no_columns() {
    let config = AssociationConfig {
        seed: Some(1),
        n_samplings: 1,
        n_permutations: 0,
        ..AssociationConfig::default()
    };
    let result = associate(
        &five_sample_target(),
        &two_feature_matrix(),
        &Pearson,
        &config,
        &SilentObserver,
    )
    .unwrap();

    let path = temp_path("scores_skipped.tsv");
    result.table.write_tsv(&path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(text.lines().next().unwrap(), "feature\tscore");
}

#[test]
fn readers_and_bundle_file_drive_a_full_run() {
    let target_path = temp_path("target.tsv");
    fs::write(
        &target_path,
        "sample\tphenotype\nA\t5\nB\t4\nC\t3\nD\t2\nE\t1\n",
    )
    .unwrap();

    let features_path = temp_path("features.tsv");
    fs::write(
        &features_path,
        "feature\tA\tB\tC\tD\tE\nF1\t5\t4\t3\t2\t1\nF2\t1\t2\t3\t4\t5\nF3\t7\t7\t7\t7\t7\n",
    )
    .unwrap();

    let bundle_path = temp_path("bundle.json");
    fs::write(
        &bundle_path,
        format!(
            r#"[{{"name": "expression", "file": "{}", "value_type": "continuous"}}]"#,
            features_path.display()
        ),
    )
    .unwrap();

    let target = matrix::read_target_tsv(&target_path).unwrap();
    assert_eq!(target.name, "phenotype");

    let entries = bundle::read_bundle_file(&bundle_path).unwrap();
    assert_eq!(entries.len(), 1);
    let resolved = entries.into_iter().next().unwrap().resolve().unwrap();
    assert_eq!(resolved.matrix.nrows(), 3);

    let config = AssociationConfig {
        seed: Some(9),
        ..AssociationConfig::default()
    };
    let result = associate(
        &target,
        &resolved.matrix,
        &Pearson,
        &config,
        &SilentObserver,
    )
    .unwrap();

    // the constant row F3 is filtered out before scoring
    assert_eq!(result.table.records.len(), 2);
    assert!(result
        .table
        .records
        .iter()
        .all(|record| record.feature != "F3"));

    for path in [target_path, features_path, bundle_path] {
        fs::remove_file(path).ok();
    }
}
