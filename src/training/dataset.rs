//! Conversion of a prepared table into a feature matrix and label vector

use crate::error::{PipelineError, Result};
use crate::preprocessing::is_numeric;
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Features and labels ready for an estimator
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
    pub target: String,
}

impl Dataset {
    /// Split `df` into the `target` column and every other column as a feature
    pub fn from_frame(df: &DataFrame, target: &str) -> Result<Self> {
        let labels = target_labels(df, target)?;
        let feature_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| name != target)
            .collect();
        if feature_names.is_empty() {
            return Err(PipelineError::DataLoad(format!(
                "no feature columns besides target '{}'",
                target
            )));
        }

        let x = feature_matrix(df, &feature_names)?;
        let y = labels.iter().map(|&v| f64::from(v)).collect();
        Ok(Self {
            x,
            y,
            feature_names,
            target: target.to_string(),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    /// Integer labels of the target column
    pub fn labels(&self) -> Vec<i32> {
        self.y.iter().map(|&v| v as i32).collect()
    }

    /// Distinct labels in ascending order
    pub fn classes(&self) -> Vec<i32> {
        let mut classes = self.labels();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

/// Coerce the target column to non-negative 32-bit integer labels
pub fn target_labels(df: &DataFrame, target: &str) -> Result<Vec<i32>> {
    let column = df
        .column(target)
        .map_err(|_| PipelineError::DataLoad(format!("missing target column '{}'", target)))?;
    if !is_numeric(column.dtype()) {
        return Err(PipelineError::data_type(
            target,
            format!("target must be numeric, found {}", column.dtype()),
        ));
    }

    let values = column
        .as_materialized_series()
        .strict_cast(&DataType::Float64)
        .map_err(|e| PipelineError::data_type(target, e.to_string()))?;

    values
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v.fract() == 0.0 && v >= 0.0 && v <= f64::from(i32::MAX) => Ok(v as i32),
            Some(v) => Err(PipelineError::data_type(
                target,
                format!("row {}: {} is not a valid class label", row, v),
            )),
            None => Err(PipelineError::data_type(target, format!("row {}: missing label", row))),
        })
        .collect()
}

/// Coerce the named columns to a row-major f64 matrix; nulls become NaN
pub fn feature_matrix(df: &DataFrame, feature_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = feature_names
        .iter()
        .map(|name| {
            let column = df
                .column(name)
                .map_err(|_| PipelineError::DataLoad(format!("missing feature column '{}'", name)))?;
            if !is_numeric(column.dtype()) {
                return Err(PipelineError::data_type(
                    name.as_str(),
                    format!("feature must be numeric, found {}", column.dtype()),
                ));
            }
            let values = column
                .as_materialized_series()
                .strict_cast(&DataType::Float64)
                .map_err(|e| PipelineError::data_type(name.as_str(), e.to_string()))?;
            let values: Vec<f64> = values
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            Ok(values)
        })
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, feature_names.len()), |(r, c)| col_data[c][r]))
}
