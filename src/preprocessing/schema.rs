//! Table contracts checked at every stage boundary
//!
//! Each stage declares the columns it needs and their kind, and validates the
//! table it reads before doing any work. A schema drift between stages then
//! fails at the reading stage instead of surfacing later as a training error.

use crate::error::{PipelineError, Result};
use polars::prelude::*;

/// Kind of values a column must hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Integer or floating point values
    Numeric,
    /// Any values, treated as category labels
    Categorical,
}

/// One declared column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Named, typed column list for a table artifact
#[derive(Debug, Clone)]
pub struct TableContract {
    stage: &'static str,
    columns: Vec<ColumnSpec>,
    all_numeric: bool,
}

impl TableContract {
    /// Empty contract for the given consuming stage
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            columns: Vec::new(),
            all_numeric: false,
        }
    }

    /// Require a column of the given kind
    pub fn with_column(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            kind,
        });
        self
    }

    /// Require several columns of the same kind
    pub fn with_columns<S: AsRef<str>>(mut self, names: &[S], kind: ColumnKind) -> Self {
        for name in names {
            self = self.with_column(name.as_ref(), kind);
        }
        self
    }

    /// Require every column of the table to be numeric
    pub fn all_numeric(mut self) -> Self {
        self.all_numeric = true;
        self
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Check `df` against the contract
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        for spec in &self.columns {
            let column = df.column(&spec.name).map_err(|_| {
                PipelineError::DataLoad(format!(
                    "{}: missing required column '{}'",
                    self.stage, spec.name
                ))
            })?;
            if spec.kind == ColumnKind::Numeric && !is_numeric(column.dtype()) {
                return Err(self.not_numeric(&spec.name, column.dtype()));
            }
        }

        if self.all_numeric {
            for column in df.get_columns() {
                if !is_numeric(column.dtype()) {
                    return Err(self.not_numeric(column.name().as_str(), column.dtype()));
                }
            }
        }

        Ok(())
    }

    fn not_numeric(&self, name: &str, dtype: &DataType) -> PipelineError {
        PipelineError::data_type(
            name,
            format!("{} expects a numeric column, found {}", self.stage, dtype),
        )
    }
}

/// Whether `dtype` is an integer or floating point type
pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}
