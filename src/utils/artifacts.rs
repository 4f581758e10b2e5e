//! All-or-nothing writes for stages that emit several artifacts

use super::data_loader::ensure_parent_dir;
use crate::error::Result;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Serialized artifacts waiting to be written together
///
/// Contents are built in memory first. `commit` stages every file next to its
/// destination and only renames them into place once all staging writes
/// succeeded, so a failure leaves no new artifact behind.
#[derive(Debug, Default)]
pub struct ArtifactBatch {
    pending: Vec<(PathBuf, Vec<u8>)>,
}

impl ArtifactBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, destination: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.pending.push((destination.into(), contents.into()));
        self
    }

    pub fn commit(self) -> Result<()> {
        for (destination, _) in &self.pending {
            if destination.is_dir() {
                return Err(io::Error::other(format!(
                    "cannot write artifact {}: path is a directory",
                    destination.display()
                ))
                .into());
            }
        }

        let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(self.pending.len());
        for (destination, contents) in &self.pending {
            let tmp = staging_path(destination);
            let written = ensure_parent_dir(destination)
                .and_then(|()| fs::write(&tmp, contents).map_err(Into::into));
            if let Err(err) = written {
                let _ = fs::remove_file(&tmp);
                discard(&staged);
                return Err(err);
            }
            staged.push((tmp, destination.as_path()));
        }

        for (idx, (tmp, destination)) in staged.iter().enumerate() {
            if let Err(err) = fs::rename(tmp, destination) {
                discard(&staged[idx..]);
                return Err(err.into());
            }
        }
        Ok(())
    }
}

fn staging_path(destination: &Path) -> PathBuf {
    let mut name: OsString = destination.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    destination.with_file_name(name)
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}
