//! One-indicator-per-category encoding over the observed batch
//!
//! Categories are collected from the frame being encoded, in order of first
//! appearance. A category absent from the batch contributes no column, so two
//! batches with different category sets produce different column sets.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};

/// Category name used for missing values
pub const MISSING_CATEGORY: &str = "nan";

/// One-hot encoder for a fixed list of columns
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    // column name -> categories in first-appearance order
    categories: HashMap<String, Vec<String>>,
    is_fitted: bool,
}

impl OneHotEncoder {
    /// Create an encoder for the given columns
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            categories: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Collect the categories observed in `df`
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.categories.clear();
        for col_name in &self.columns {
            let values = Self::string_values(df, col_name)?;
            let mut seen = HashSet::new();
            let mut ordered = Vec::new();
            for value in values {
                if seen.insert(value.clone()) {
                    ordered.push(value);
                }
            }
            self.categories.insert(col_name.clone(), ordered);
        }
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every encoded column by its indicator columns, in place of the original
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::Training("encoder used before fit".to_string()));
        }

        let mut out: Vec<Column> = Vec::with_capacity(df.width());
        let mut names: HashSet<String> = HashSet::new();

        for column in df.get_columns() {
            let name = column.name().to_string();
            match self.categories.get(&name) {
                Some(categories) => {
                    let values = Self::string_values(df, &name)?;
                    for category in categories {
                        let indicator_name = format!("{}_{}", name, category);
                        let indicator: Vec<i32> = values
                            .iter()
                            .map(|v| i32::from(v == category))
                            .collect();
                        Self::claim_name(&mut names, &indicator_name, &name)?;
                        out.push(Series::new(indicator_name.as_str().into(), indicator).into());
                    }
                }
                None => {
                    Self::claim_name(&mut names, &name, &name)?;
                    out.push(column.clone());
                }
            }
        }

        Ok(DataFrame::new(out)?)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Categories observed for `column` during fit
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.categories.get(column).map(|c| c.as_slice())
    }

    fn claim_name(names: &mut HashSet<String>, name: &str, source: &str) -> Result<()> {
        if names.insert(name.to_string()) {
            Ok(())
        } else {
            Err(PipelineError::NameCollision {
                first: name.to_string(),
                second: source.to_string(),
                normalized: name.to_string(),
            })
        }
    }

    fn string_values(df: &DataFrame, col_name: &str) -> Result<Vec<String>> {
        let column = df.column(col_name).map_err(|_| {
            PipelineError::DataLoad(format!("missing required column '{}'", col_name))
        })?;
        let series = column.as_materialized_series().cast(&DataType::String)?;
        let values = series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string).unwrap_or_else(|| MISSING_CATEGORY.to_string()))
            .collect();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            "age" => &[25, 68, 35],
            "ownership" => &["OWN", "RENT", "OWN"],
            "intent" => &["VENTURE", "EDUCATION", "MEDICAL"]
        )
        .unwrap()
    }

    #[test]
    fn test_categories_in_first_appearance_order() {
        let mut encoder = OneHotEncoder::new(&["ownership"]);
        encoder.fit(&sample()).unwrap();
        assert_eq!(encoder.categories("ownership").unwrap(), &["OWN", "RENT"]);
    }

    #[test]
    fn test_indicator_columns_replace_original_in_place() {
        let mut encoder = OneHotEncoder::new(&["ownership", "intent"]);
        let out = encoder.fit_transform(&sample()).unwrap();

        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "age",
                "ownership_OWN",
                "ownership_RENT",
                "intent_VENTURE",
                "intent_EDUCATION",
                "intent_MEDICAL"
            ]
        );

        let own: Vec<Option<i32>> = out.column("ownership_OWN").unwrap().as_materialized_series().i32().unwrap().into_iter().collect();
        assert_eq!(own, vec![Some(1), Some(0), Some(1)]);
        assert_eq!(out.height(), 3);
    }

    #[test]
    fn test_missing_values_become_their_own_category() {
        let df = df!("ownership" => &[Some("OWN"), None, Some("OWN")]).unwrap();
        let mut encoder = OneHotEncoder::new(&["ownership"]);
        let out = encoder.fit_transform(&df).unwrap();
        assert!(out.column("ownership_nan").is_ok());
    }

    #[test]
    fn test_missing_column_is_data_load_error() {
        let mut encoder = OneHotEncoder::new(&["not_there"]);
        assert!(matches!(encoder.fit(&sample()), Err(PipelineError::DataLoad(_))));
    }

    #[test]
    fn test_indicator_clashing_with_existing_column() {
        let df = df!(
            "ownership" => &["OWN", "RENT"],
            "ownership_OWN" => &[1, 0]
        )
        .unwrap();
        let mut encoder = OneHotEncoder::new(&["ownership"]);
        assert!(matches!(
            encoder.fit_transform(&df),
            Err(PipelineError::NameCollision { .. })
        ));
    }
}
