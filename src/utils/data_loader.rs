//! CSV loading and saving for the pipeline's table artifacts

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Reads comma separated tables with a header row
#[derive(Debug, Clone, Default)]
pub struct DataLoader;

impl DataLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a CSV file. Any read or parse failure is a `DataLoad` error.
    ///
    /// Column types are inferred from every row.
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PipelineError::DataLoad(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(b',');

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::DataLoad(format!("{}: {}", path.display(), e)))
    }
}

/// Writes tables as CSV with a header row
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV, creating parent directories as needed
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = Self::to_csv_bytes(df)
            .map_err(|e| PipelineError::DataLoad(format!("{}: {}", path.display(), e)))?;
        ensure_parent_dir(path)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serialize to CSV in memory, header included
    pub fn to_csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .finish(df)
            .map_err(|e| PipelineError::DataLoad(e.to_string()))?;
        Ok(buf)
    }
}

/// Create the parent directory of an output artifact
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "a,b,c").unwrap();
        writeln!(file, "1,2,x").unwrap();
        writeln!(file, "4,5,y").unwrap();
        writeln!(file, "7,8,z").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let df = DataLoader::new().load_csv(file.path()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("c").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_missing_file_is_data_load_error() {
        let err = DataLoader::new().load_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, PipelineError::DataLoad(_)));
    }

    #[test]
    fn test_csv_bytes_have_header() {
        let mut df = df!("a" => &[1, 2], "b" => &["x", "y"]).unwrap();
        let text = String::from_utf8(DataSaver::to_csv_bytes(&mut df).unwrap()).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["a,b", "1,x", "2,y"]);
    }

    #[test]
    fn test_save_csv_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let mut df = df!("a" => &[1, 2, 3], "b" => &[4.5, 5.5, 6.5]).unwrap();

        DataSaver::save_csv(&mut df, &path).unwrap();

        let loaded = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.width(), 2);
    }
}
