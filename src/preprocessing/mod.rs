//! Data preparation
//!
//! Turns the raw loan application table into a fully numeric table:
//! - One indicator column per observed category
//! - Ordinal mapping of loan grades and Y/N flags
//! - Column name normalization
//! - Column contracts checked at each stage boundary

pub mod encoder;
pub mod names;
pub mod ordinal;
pub mod preparer;
pub mod schema;

pub use encoder::{OneHotEncoder, MISSING_CATEGORY};
pub use names::{normalize_column_names, normalize_name};
pub use ordinal::{flag_value, grade_value, FLAG_SCALE, GRADE_SCALE};
pub use preparer::DataPreparer;
pub use schema::{is_numeric, ColumnKind, ColumnSpec, TableContract};
