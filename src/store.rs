use std::fs;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::Builder;

use crate::domain::{LigandFormat, SubsetCode, ZincId};
use crate::error::HarvestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub bucket_dir: Utf8PathBuf,
    pub work_list: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
}

impl Default for StorePaths {
    fn default() -> Self {
        Self {
            bucket_dir: Utf8PathBuf::from("zinc_ids"),
            work_list: Utf8PathBuf::from("zinc_ids.txt"),
            output_dir: Utf8PathBuf::from("set_1"),
        }
    }
}

/// Flat-file layout shared by every stage: one artifact per bucket, the
/// merged work list, and the ligand output directory.
#[derive(Debug, Clone)]
pub struct Store {
    paths: StorePaths,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearReport {
    pub removed: usize,
    pub failed: usize,
    pub listing_error: Option<String>,
}

impl Store {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn work_list_path(&self) -> &Utf8Path {
        &self.paths.work_list
    }

    pub fn output_dir(&self) -> &Utf8Path {
        &self.paths.output_dir
    }

    pub fn bucket_artifact_path(&self, subset: SubsetCode) -> Utf8PathBuf {
        self.paths.bucket_dir.join(format!("zinc_ids_{subset}.txt"))
    }

    pub fn ligand_path(output_dir: &Utf8Path, id: &ZincId, format: LigandFormat) -> Utf8PathBuf {
        output_dir.join(format!("{id}.{}", format.extension()))
    }

    pub fn ensure_dir(path: &Utf8Path) -> Result<(), HarvestError> {
        fs::create_dir_all(path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("create {path}: {err}")))
    }

    /// Replaces `path` with one id per line. The content goes to a temp file
    /// in the same directory first, so readers never see a partial list.
    pub fn write_ids_atomic(path: &Utf8Path, ids: &[ZincId]) -> Result<(), HarvestError> {
        let parent = parent_dir(path);
        Self::ensure_dir(parent)?;
        let temp = Builder::new()
            .prefix(".zinc-harvest")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            for id in ids {
                writeln!(writer, "{id}")
                    .map_err(|err| HarvestError::Filesystem(format!("write {path}: {err}")))?;
            }
            writer
                .flush()
                .map_err(|err| HarvestError::Filesystem(format!("write {path}: {err}")))?;
        }
        temp.persist(path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("persist {path}: {err}")))?;
        Ok(())
    }

    /// Reads a bucket artifact or work list. Blank lines are ignored and
    /// lines that are not ZINC ids are skipped with a warning.
    pub fn read_ids(path: &Utf8Path) -> Result<Vec<ZincId>, HarvestError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("read {path}: {err}")))?;
        let mut ids = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match ZincId::normalize(line) {
                Some(id) => ids.push(id),
                None => tracing::warn!(%path, line = line_no + 1, "skipping malformed id"),
            }
        }
        Ok(ids)
    }

    /// Deletes a work list left over from an earlier run. Returns whether a
    /// file was removed.
    pub fn remove_work_list(&self) -> Result<bool, HarvestError> {
        let path = self.work_list_path();
        match fs::remove_file(path.as_std_path()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(HarvestError::Filesystem(format!("remove {path}: {err}"))),
        }
    }

    /// Removes every entry below `dir`. A directory that cannot be listed is
    /// reported, not raised; the caller carries on with an untouched directory.
    pub fn clear_dir(dir: &Utf8Path) -> ClearReport {
        let mut report = ClearReport::default();
        let entries = match fs::read_dir(dir.as_std_path()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return report,
            Err(err) => {
                tracing::warn!(%dir, error = %err, "cannot list output directory");
                report.listing_error = Some(err.to_string());
                return report;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(%dir, error = %err, "cannot read directory entry");
                    report.failed += 1;
                    continue;
                }
            };
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed");
                    report.removed += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "cannot remove");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

pub(crate) fn parent_dir(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FilterBucket;

    #[test]
    fn layout_paths() {
        let store = Store::new(StorePaths::default());
        let subset = FilterBucket::new("350", "3").resolve().unwrap();
        assert!(
            store
                .bucket_artifact_path(subset)
                .ends_with("zinc_ids/zinc_ids_EF.txt")
        );

        let id = ZincId::normalize("ZINC42").unwrap();
        let ligand = Store::ligand_path(store.output_dir(), &id, LigandFormat::Sdf);
        assert!(ligand.ends_with("set_1/ZINC000000000042.sdf"));
    }

    #[test]
    fn parent_of_bare_file_is_cwd() {
        assert_eq!(parent_dir(Utf8Path::new("zinc_ids.txt")), Utf8Path::new("."));
        assert_eq!(parent_dir(Utf8Path::new("a/b.txt")), Utf8Path::new("a"));
    }
}
