//! Data preparation stage: raw loan applications -> prepared numeric table

use super::encoder::OneHotEncoder;
use super::names;
use super::ordinal;
use super::schema::{ColumnKind, TableContract};
use crate::config::{DataProcessConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::utils::{DataLoader, DataSaver};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Loads, encodes and renames the raw table
#[derive(Debug, Clone)]
pub struct DataPreparer {
    config: DataProcessConfig,
}

impl DataPreparer {
    /// Build the stage from the `data_process` section
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Self::from_section(config.data_process()?)
    }

    pub fn from_section(config: DataProcessConfig) -> Result<Self> {
        if config.name_separator.is_empty() {
            return Err(PipelineError::invalid_config(
                "data_process.name_separator",
                "\"\"",
                "separator must not be empty",
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &DataProcessConfig {
        &self.config
    }

    /// Contract for the raw input table
    pub fn raw_contract(&self) -> TableContract {
        TableContract::new("prepare")
            .with_columns(&self.config.categorical_columns, ColumnKind::Categorical)
            .with_column(self.config.grade_column.as_str(), ColumnKind::Categorical)
            .with_columns(&self.config.flag_columns, ColumnKind::Categorical)
    }

    /// Load the configured raw table
    pub fn load(&self) -> Result<DataFrame> {
        self.load_from(&self.config.raw_data_path)
    }

    /// Load a raw table from `source` and check its required columns
    pub fn load_from(&self, source: impl AsRef<Path>) -> Result<DataFrame> {
        let df = DataLoader::new().load_csv(source.as_ref())?;
        self.raw_contract().validate(&df)?;
        info!(
            path = %source.as_ref().display(),
            rows = df.height(),
            columns = df.width(),
            "Loaded raw data"
        );
        Ok(df)
    }

    /// Expand the configured categorical columns into indicator columns
    pub fn encode(&self, raw: &DataFrame) -> Result<DataFrame> {
        let mut encoder = OneHotEncoder::new(&self.config.categorical_columns);
        let encoded = encoder.fit_transform(raw)?;
        for column in &self.config.categorical_columns {
            debug!(
                column = %column,
                categories = encoder.categories(column).map_or(0, |c| c.len()),
                "Encoded categorical column"
            );
        }
        Ok(encoded)
    }

    /// Map the grade column A..G -> 1..7
    pub fn map_grade(&self, df: &mut DataFrame) -> Result<()> {
        ordinal::map_grade(df, &self.config.grade_column)
    }

    /// Map every flag column N/Y -> 0/1
    pub fn map_flags(&self, df: &mut DataFrame) -> Result<()> {
        for column in &self.config.flag_columns {
            ordinal::map_flag(df, column)?;
        }
        Ok(())
    }

    /// Strip the separator from every column name
    pub fn normalize_names(&self, df: &mut DataFrame) -> Result<()> {
        names::normalize_names(df, &self.config.name_separator)
    }

    /// Run every transformation on an in-memory raw table
    pub fn prepare(&self, raw: &DataFrame) -> Result<DataFrame> {
        let mut prepared = self.encode(raw)?;
        self.map_grade(&mut prepared)?;
        self.map_flags(&mut prepared)?;
        self.normalize_names(&mut prepared)?;

        if prepared.height() != raw.height() {
            return Err(PipelineError::Training(format!(
                "row count changed during preparation: {} -> {}",
                raw.height(),
                prepared.height()
            )));
        }
        Ok(prepared)
    }

    /// Write the prepared table
    pub fn persist(&self, prepared: &mut DataFrame, destination: impl AsRef<Path>) -> Result<()> {
        DataSaver::save_csv(prepared, destination.as_ref())?;
        info!(
            path = %destination.as_ref().display(),
            rows = prepared.height(),
            columns = prepared.width(),
            "Saved prepared data"
        );
        Ok(())
    }

    /// Load, prepare and persist using the configured paths
    pub fn run(&self) -> Result<DataFrame> {
        let raw = self.load()?;
        let mut prepared = self.prepare(&raw)?;
        self.persist(&mut prepared, &self.config.save_path)?;
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn section() -> DataProcessConfig {
        DataProcessConfig {
            raw_data_path: PathBuf::from("raw.csv"),
            save_path: PathBuf::from("prepared.csv"),
            categorical_columns: vec!["person_home_ownership".into(), "loan_intent".into()],
            grade_column: "loan_grade".into(),
            flag_columns: vec!["cb_person_default_on_file".into()],
            name_separator: "_".into(),
        }
    }

    fn raw() -> DataFrame {
        df!(
            "person_age" => &[25, 68],
            "person_home_ownership" => &["OWN", "RENT"],
            "loan_intent" => &["PERSONAL", "PERSONAL"],
            "loan_grade" => &["A", "B"],
            "loan_status" => &[0, 1],
            "cb_person_default_on_file" => &["N", "Y"]
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_columns() {
        let preparer = DataPreparer::from_section(section()).unwrap();
        let prepared = preparer.prepare(&raw()).unwrap();
        let names: Vec<String> = prepared.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "personage",
                "personhomeownershipOWN",
                "personhomeownershipRENT",
                "loanintentPERSONAL",
                "loangrade",
                "loanstatus",
                "cbpersondefaultonfile"
            ]
        );
        assert_eq!(prepared.height(), 2);
    }

    #[test]
    fn test_empty_separator_rejected() {
        let mut config = section();
        config.name_separator = String::new();
        assert!(matches!(
            DataPreparer::from_section(config),
            Err(PipelineError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_raw_contract_lists_transformed_columns() {
        let preparer = DataPreparer::from_section(section()).unwrap();
        assert_eq!(preparer.raw_contract().columns().len(), 4);
    }
}
