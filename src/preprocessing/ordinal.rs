//! Fixed ordinal mappings for letter grades and Y/N flags
//!
//! Values outside the mapping are rejected rather than coerced to null.

use crate::error::{PipelineError, Result};
use polars::prelude::*;

/// Loan grade letters and their ordinal values
pub const GRADE_SCALE: [(&str, i32); 7] = [
    ("A", 1),
    ("B", 2),
    ("C", 3),
    ("D", 4),
    ("E", 5),
    ("F", 6),
    ("G", 7),
];

/// Prior-default flag values
pub const FLAG_SCALE: [(&str, i32); 2] = [("N", 0), ("Y", 1)];

/// Ordinal value of a single grade letter
pub fn grade_value(letter: &str) -> Option<i32> {
    lookup(&GRADE_SCALE, letter)
}

/// Numeric value of a single Y/N flag
pub fn flag_value(flag: &str) -> Option<i32> {
    lookup(&FLAG_SCALE, flag)
}

/// Replace grade letters A..G in `column` with 1..7
pub fn map_grade(df: &mut DataFrame, column: &str) -> Result<()> {
    map_column(df, column, &GRADE_SCALE)
}

/// Replace N/Y in `column` with 0/1
pub fn map_flag(df: &mut DataFrame, column: &str) -> Result<()> {
    map_column(df, column, &FLAG_SCALE)
}

fn lookup(scale: &[(&str, i32)], key: &str) -> Option<i32> {
    scale.iter().find(|(k, _)| *k == key).map(|&(_, v)| v)
}

fn map_column(df: &mut DataFrame, column: &str, scale: &[(&str, i32)]) -> Result<()> {
    let source = df
        .column(column)
        .map_err(|_| PipelineError::DataLoad(format!("missing required column '{}'", column)))?
        .as_materialized_series()
        .cast(&DataType::String)?;

    let mapped = source
        .str()?
        .into_iter()
        .map(|value| match value {
            Some(v) => lookup(scale, v).ok_or_else(|| PipelineError::UnmappedCategory {
                column: column.to_string(),
                value: v.to_string(),
            }),
            None => Err(PipelineError::UnmappedCategory {
                column: column.to_string(),
                value: "null".to_string(),
            }),
        })
        .collect::<Result<Vec<i32>>>()?;

    df.with_column(Series::new(column.into(), mapped))?;
    Ok(())
}
