//! Column name normalization

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::HashMap;

/// Remove every occurrence of `separator` from `name`
pub fn normalize_name(name: &str, separator: &str) -> String {
    if separator.is_empty() {
        return name.to_string();
    }
    name.replace(separator, "")
}

/// Normalize a list of names, rejecting two distinct names that end up equal
pub fn normalize_column_names<S: AsRef<str>>(names: &[S], separator: &str) -> Result<Vec<String>> {
    let mut seen: HashMap<String, String> = HashMap::with_capacity(names.len());
    let mut normalized = Vec::with_capacity(names.len());

    for name in names {
        let name = name.as_ref();
        let new_name = normalize_name(name, separator);
        if let Some(previous) = seen.insert(new_name.clone(), name.to_string()) {
            return Err(PipelineError::NameCollision {
                first: previous,
                second: name.to_string(),
                normalized: new_name,
            });
        }
        normalized.push(new_name);
    }

    Ok(normalized)
}

/// Rename every column of `df` in place
pub fn normalize_names(df: &mut DataFrame, separator: &str) -> Result<()> {
    let current: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let renamed = normalize_column_names(&current, separator)?;
    df.set_column_names(renamed)?;
    Ok(())
}
