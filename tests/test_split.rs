//! Integration test: Train/test split

use loanrisk::config::PipelineConfig;
use loanrisk::split::{split_indices, DataSplitter};
use loanrisk::utils::{DataLoader, DataSaver};
use loanrisk::PipelineError;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;

fn prepared_frame(n: usize) -> DataFrame {
    let ids: Vec<i64> = (0..n as i64).collect();
    let grades: Vec<i32> = (0..n).map(|i| (i % 7) as i32 + 1).collect();
    let status: Vec<i32> = (0..n).map(|i| (i % 3 == 0) as i32).collect();
    df!(
        "rowid" => &ids,
        "loangrade" => &grades,
        "loanstatus" => &status
    )
    .unwrap()
}

fn config(dir: &Path, test_size: f64, seed: u64) -> PipelineConfig {
    let yaml = format!(
        r#"
base:
  random_state: {seed}
data_process:
  raw_data_path: {dir}/raw.csv
  save_path: {dir}/prepared.csv
data_split:
  test_size: {test_size}
  trainset_path: {dir}/split/train.csv
  testset_path: {dir}/split/test.csv
"#,
        seed = seed,
        test_size = test_size,
        dir = dir.display()
    );
    PipelineConfig::from_yaml_str(&yaml).unwrap()
}

fn row_ids(df: &DataFrame) -> Vec<i64> {
    df.column("rowid")
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

#[test]
fn test_disjoint_and_complete() {
    for &(n, fraction) in &[(10usize, 0.2), (37, 0.25), (100, 0.33), (5, 0.5)] {
        let split = split_indices(n, fraction, 7).unwrap();
        let train: HashSet<usize> = split.train.iter().copied().collect();
        let test: HashSet<usize> = split.test.iter().copied().collect();

        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), n);
        assert_eq!(split.train.len() + split.test.len(), n);
        assert_eq!(test.len(), (fraction * n as f64).ceil() as usize);
    }
}

#[test]
fn test_same_seed_same_partition() {
    let first = split_indices(50, 0.3, 42).unwrap();
    let second = split_indices(50, 0.3, 42).unwrap();
    assert_eq!(first, second);

    let other = split_indices(50, 0.3, 43).unwrap();
    assert_ne!(first.test, other.test);
}

#[test]
fn test_fraction_out_of_range() {
    for fraction in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
        assert!(matches!(
            split_indices(10, fraction, 0),
            Err(PipelineError::InvalidConfiguration { .. })
        ));
    }
}

#[test]
fn test_empty_side_rejected() {
    // ceil(0.99 * 3) == 3 leaves no training row
    assert!(matches!(
        split_indices(3, 0.99, 0),
        Err(PipelineError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_splitter_frames_keep_rows_intact() {
    let dir = TempDir::new().unwrap();
    let splitter = DataSplitter::new(&config(dir.path(), 0.25, 11)).unwrap();
    let df = prepared_frame(20);

    let (train, test) = splitter.split(&df, 0.25, 11).unwrap();
    assert_eq!(test.height(), 5);
    assert_eq!(train.height(), 15);
    assert_eq!(train.get_column_names(), df.get_column_names());

    let mut ids = row_ids(&train);
    ids.extend(row_ids(&test));
    ids.sort_unstable();
    assert_eq!(ids, (0..20).collect::<Vec<i64>>());
}

#[test]
fn test_run_persists_both_sides() {
    let dir = TempDir::new().unwrap();
    let mut prepared = prepared_frame(30);
    DataSaver::save_csv(&mut prepared, &dir.path().join("prepared.csv")).unwrap();

    let config = config(dir.path(), 0.2, 42);
    let (train, test) = DataSplitter::new(&config).unwrap().run().unwrap();
    assert_eq!(train.height(), 24);
    assert_eq!(test.height(), 6);

    let train_disk = DataLoader::new().load_csv(dir.path().join("split/train.csv")).unwrap();
    let test_disk = DataLoader::new().load_csv(dir.path().join("split/test.csv")).unwrap();
    assert_eq!(row_ids(&train_disk), row_ids(&train));
    assert_eq!(row_ids(&test_disk), row_ids(&test));

    // a second run reproduces the same partition
    let (_, again) = DataSplitter::new(&config).unwrap().run().unwrap();
    assert_eq!(row_ids(&again), row_ids(&test));
}

#[test]
fn test_bad_fraction_fails_before_io() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), 1.0, 42);
    // prepared.csv does not exist: the configuration error must win
    assert!(matches!(
        DataSplitter::new(&config).unwrap().run(),
        Err(PipelineError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_non_numeric_prepared_column_rejected() {
    let dir = TempDir::new().unwrap();
    let mut prepared = df!(
        "loangrade" => &[1, 2, 3, 4],
        "loanintent" => &["PERSONAL", "EDUCATION", "PERSONAL", "VENTURE"]
    )
    .unwrap();
    DataSaver::save_csv(&mut prepared, &dir.path().join("prepared.csv")).unwrap();

    let result = DataSplitter::new(&config(dir.path(), 0.5, 1)).unwrap().run();
    assert!(matches!(result, Err(PipelineError::DataType { .. })));
}

#[test]
fn test_blocked_test_path_leaves_no_train_file() {
    let dir = TempDir::new().unwrap();
    let mut prepared = prepared_frame(20);
    DataSaver::save_csv(&mut prepared, &dir.path().join("prepared.csv")).unwrap();
    std::fs::create_dir_all(dir.path().join("split/test.csv")).unwrap();

    let result = DataSplitter::new(&config(dir.path(), 0.25, 3)).unwrap().run();
    assert!(matches!(result, Err(PipelineError::Io(_))));
    assert!(!dir.path().join("split/train.csv").exists());
}
