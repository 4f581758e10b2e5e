//! Train/test partition of the prepared table

use crate::config::{DataSplitConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::preprocessing::TableContract;
use crate::utils::{ArtifactBatch, DataLoader, DataSaver};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use tracing::info;

/// Row positions assigned to each side of a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Compute a seeded, unstratified partition of `n_rows` rows.
///
/// The test side gets `ceil(test_fraction * n_rows)` rows taken from the front
/// of a ChaCha8 permutation; the train side gets the rest, both in permutation
/// order.
pub fn split_indices(n_rows: usize, test_fraction: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::invalid_config(
            "data_split.test_size",
            test_fraction,
            "must lie strictly between 0 and 1",
        ));
    }

    let n_test = (test_fraction * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(PipelineError::invalid_config(
            "data_split.test_size",
            test_fraction,
            format!("leaves an empty side when splitting {} rows", n_rows),
        ));
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let train = order.split_off(n_test);
    Ok(SplitIndices { train, test: order })
}

/// Splits the prepared table into train and test sets
#[derive(Debug, Clone)]
pub struct DataSplitter {
    config: DataSplitConfig,
    prepared_path: std::path::PathBuf,
    seed: u64,
}

impl DataSplitter {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let split = config.data_split()?;
        let prepared_path = config.data_process()?.save_path;
        Ok(Self {
            config: split,
            prepared_path,
            seed: config.base.random_state,
        })
    }

    pub fn config(&self) -> &DataSplitConfig {
        &self.config
    }

    /// Contract for the prepared input table
    pub fn input_contract() -> TableContract {
        TableContract::new("split").all_numeric()
    }

    /// Partition `df` into (train, test)
    pub fn split(
        &self,
        df: &DataFrame,
        test_fraction: f64,
        seed: u64,
    ) -> Result<(DataFrame, DataFrame)> {
        let indices = split_indices(df.height(), test_fraction, seed)?;
        let train = take_rows(df, &indices.train)?;
        let test = take_rows(df, &indices.test)?;

        info!(
            rows = df.height(),
            train_rows = train.height(),
            test_rows = test.height(),
            seed,
            "Split prepared data"
        );
        Ok((train, test))
    }

    /// Write both sides to the configured destinations
    pub fn persist(&self, train: &mut DataFrame, test: &mut DataFrame) -> Result<()> {
        self.persist_to(train, test, &self.config.trainset_path, &self.config.testset_path)
    }

    pub fn persist_to(
        &self,
        train: &mut DataFrame,
        test: &mut DataFrame,
        train_path: impl AsRef<Path>,
        test_path: impl AsRef<Path>,
    ) -> Result<()> {
        ArtifactBatch::new()
            .with(train_path.as_ref(), DataSaver::to_csv_bytes(train)?)
            .with(test_path.as_ref(), DataSaver::to_csv_bytes(test)?)
            .commit()?;
        info!(
            train = %train_path.as_ref().display(),
            test = %test_path.as_ref().display(),
            "Saved train and test sets"
        );
        Ok(())
    }

    /// Load the prepared table, split it and persist both sides
    pub fn run(&self) -> Result<(DataFrame, DataFrame)> {
        // reject a bad fraction before touching the filesystem
        if !(self.config.test_size > 0.0 && self.config.test_size < 1.0) {
            return Err(PipelineError::invalid_config(
                "data_split.test_size",
                self.config.test_size,
                "must lie strictly between 0 and 1",
            ));
        }

        let prepared = DataLoader::new().load_csv(&self.prepared_path)?;
        Self::input_contract().validate(&prepared)?;

        let (mut train, mut test) = self.split(&prepared, self.config.test_size, self.seed)?;
        self.persist(&mut train, &mut test)?;
        Ok((train, test))
    }
}

/// Gather rows of `df` at `rows`, in that order
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = rows.iter().map(|&r| r as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_round_test_side_up() {
        let split = split_indices(10, 0.25, 7).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 7);
    }

    #[test]
    fn test_disjoint_and_complete() {
        let split = split_indices(57, 0.2, 42).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..57).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_partition() {
        assert_eq!(split_indices(100, 0.3, 5).unwrap(), split_indices(100, 0.3, 5).unwrap());
        assert_ne!(split_indices(100, 0.3, 5).unwrap(), split_indices(100, 0.3, 6).unwrap());
    }

    #[test]
    fn test_fraction_bounds() {
        for bad in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            assert!(matches!(
                split_indices(10, bad, 1),
                Err(PipelineError::InvalidConfiguration { .. })
            ));
        }
    }

    #[test]
    fn test_empty_side_rejected() {
        assert!(split_indices(1, 0.5, 1).is_err());
        assert!(split_indices(0, 0.5, 1).is_err());
    }

    #[test]
    fn test_take_rows_keeps_order() {
        let df = df!("a" => &[10, 20, 30, 40]).unwrap();
        let out = take_rows(&df, &[3, 0]).unwrap();
        let values: Vec<Option<i32>> = out
            .column("a")
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some(40), Some(10)]);
    }
}
