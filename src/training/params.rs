//! Hyperparameter values, grids and combinations

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value as written in the configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Integer value, `None` for any other kind
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value; integers widen to float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// One point of the grid: hyperparameter name -> value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}}")
    }
}

/// Candidate values per hyperparameter.
///
/// Names are kept sorted; combinations are enumerated with the last name
/// varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<ParamValue>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hyperparameter with its candidate values
    pub fn with<V: Into<ParamValue>>(mut self, name: impl Into<String>, values: Vec<V>) -> Self {
        self.0
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Number of combinations (0 for an empty grid)
    pub fn len(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hyperparameter names in enumeration order
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Every combination in enumeration order
    pub fn combinations(&self) -> Result<Vec<ParamSet>> {
        if self.is_empty() {
            return Err(PipelineError::invalid_config(
                "train.param_grid",
                "{}",
                "hyperparameter grid has no combinations",
            ));
        }

        let axes: Vec<(&String, &Vec<ParamValue>)> = self.0.iter().collect();
        let mut cursor = vec![0usize; axes.len()];
        let mut out = Vec::with_capacity(self.len());

        loop {
            let set = axes
                .iter()
                .zip(cursor.iter())
                .map(|((name, values), &i)| ((*name).clone(), values[i].clone()))
                .collect();
            out.push(ParamSet(set));

            // odometer step, last axis fastest
            let mut axis = axes.len();
            loop {
                if axis == 0 {
                    return Ok(out);
                }
                axis -= 1;
                cursor[axis] += 1;
                if cursor[axis] < axes[axis].1.len() {
                    break;
                }
                cursor[axis] = 0;
            }
        }
    }
}

/// Read a non-negative integer hyperparameter no smaller than `min`
pub(crate) fn usize_param(owner: &str, name: &str, value: &ParamValue, min: usize) -> Result<usize> {
    match value.as_i64() {
        Some(v) if v >= 0 && v as u64 >= min as u64 => Ok(v as usize),
        Some(_) => Err(PipelineError::invalid_config(
            format!("{}.{}", owner, name),
            value,
            format!("must be an integer >= {}", min),
        )),
        None => Err(PipelineError::invalid_config(
            format!("{}.{}", owner, name),
            value,
            "expected an integer",
        )),
    }
}

/// Read a numeric hyperparameter inside `[low, high]`
pub(crate) fn f64_param(owner: &str, name: &str, value: &ParamValue, low: f64, high: f64) -> Result<f64> {
    match value.as_f64() {
        Some(v) if v >= low && v <= high => Ok(v),
        Some(_) => Err(PipelineError::invalid_config(
            format!("{}.{}", owner, name),
            value,
            format!("must lie in [{}, {}]", low, high),
        )),
        None => Err(PipelineError::invalid_config(
            format!("{}.{}", owner, name),
            value,
            "expected a number",
        )),
    }
}

pub(crate) fn unknown_param(owner: &str, name: &str, value: &ParamValue) -> PipelineError {
    PipelineError::invalid_config(
        format!("{}.{}", owner, name),
        value,
        format!("unknown hyperparameter for {}", owner),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_readers() {
        assert_eq!(usize_param("xgb", "max_depth", &ParamValue::Int(4), 1).unwrap(), 4);
        assert!(usize_param("xgb", "max_depth", &ParamValue::Int(0), 1).is_err());
        assert!(usize_param("xgb", "max_depth", &ParamValue::Float(3.5), 1).is_err());
        assert_eq!(f64_param("xgb", "subsample", &ParamValue::Int(1), 0.0, 1.0).unwrap(), 1.0);
        assert!(f64_param("xgb", "subsample", &ParamValue::Float(1.5), 0.0, 1.0).is_err());
        assert!(f64_param("xgb", "subsample", &ParamValue::Float(f64::NAN), 0.0, 1.0).is_err());
    }

    #[test]
    fn test_yaml_kinds() {
        let grid: ParamGrid =
            serde_yaml::from_str("max_depth: [3, 5]\nlearning_rate: [0.1]\ncriterion: [gini]\n")
                .unwrap();
        assert_eq!(grid.len(), 2);
        let combos = grid.combinations().unwrap();
        assert_eq!(combos[0].get("max_depth"), Some(&ParamValue::Int(3)));
        assert_eq!(combos[0].get("learning_rate"), Some(&ParamValue::Float(0.1)));
        assert_eq!(combos[0].get("criterion").and_then(|v| v.as_str()), Some("gini"));
    }

    #[test]
    fn test_last_name_varies_fastest() {
        let grid = ParamGrid::new()
            .with("b", vec![1i64, 2])
            .with("a", vec![10i64, 20]);
        let combos = grid.combinations().unwrap();
        let pairs: Vec<(i64, i64)> = combos
            .iter()
            .map(|c| {
                (
                    c.get("a").and_then(ParamValue::as_i64).unwrap(),
                    c.get("b").and_then(ParamValue::as_i64).unwrap(),
                )
            })
            .collect();
        assert_eq!(pairs, vec![(10, 1), (10, 2), (20, 1), (20, 2)]);
    }

    #[test]
    fn test_empty_grids() {
        assert!(ParamGrid::new().combinations().is_err());
        let empty_axis = ParamGrid::new()
            .with("a", vec![1i64])
            .with("b", Vec::<i64>::new());
        assert_eq!(empty_axis.len(), 0);
        assert!(matches!(
            empty_axis.combinations(),
            Err(PipelineError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_param_set_display() {
        let set = ParamSet::new().with("max_depth", 3i64).with("learning_rate", 0.1);
        assert_eq!(set.to_string(), "{learning_rate=0.1, max_depth=3}");
    }
}
