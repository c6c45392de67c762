use std::fs;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::Builder;

use crate::error::HarvestError;
use crate::store::{Store, parent_dir};

/// SDF record terminator.
pub const RECORD_END: &str = "$$$$";

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub output: Utf8PathBuf,
    pub merged: usize,
    pub skipped: Vec<Utf8PathBuf>,
}

/// Concatenates every `*.sdf` file of `input_dir` (sorted by name) into
/// `output`, each input terminated by exactly one `$$$$` line.
pub fn merge_sdf_dir(input_dir: &Utf8Path, output: &Utf8Path) -> Result<MergeReport, HarvestError> {
    let mut inputs = fs::read_dir(input_dir.as_std_path())
        .map_err(|err| HarvestError::Filesystem(format!("read {input_dir}: {err}")))?
        .filter_map(Result::ok)
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.path()).ok())
        .filter(|path| path.is_file() && path.extension() == Some("sdf"))
        .filter(|path| path != output)
        .collect::<Vec<_>>();
    inputs.sort();

    let parent = parent_dir(output);
    Store::ensure_dir(parent)?;
    let temp = Builder::new()
        .prefix(".zinc-harvest-merge")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;

    let mut merged = 0usize;
    let mut skipped = Vec::new();
    {
        let mut writer = BufWriter::new(temp.as_file());
        for path in &inputs {
            let content = match fs::read_to_string(path.as_std_path()) {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(%path, error = %err, "cannot read SDF file, skipping");
                    skipped.push(path.clone());
                    continue;
                }
            };
            let body = strip_record_end(&content);
            if body.is_empty() {
                skipped.push(path.clone());
                continue;
            }
            writeln!(writer, "{body}\n{RECORD_END}")
                .map_err(|err| HarvestError::Filesystem(format!("write {output}: {err}")))?;
            merged += 1;
        }
        writer
            .flush()
            .map_err(|err| HarvestError::Filesystem(format!("write {output}: {err}")))?;
    }
    temp.persist(output.as_std_path())
        .map_err(|err| HarvestError::Filesystem(format!("persist {output}: {err}")))?;

    tracing::info!(%output, merged, skipped = skipped.len(), "SDF files merged");
    Ok(MergeReport {
        output: output.to_path_buf(),
        merged,
        skipped,
    })
}

fn strip_record_end(content: &str) -> &str {
    let trimmed = content.trim_end();
    trimmed
        .strip_suffix(RECORD_END)
        .map(str::trim_end)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_terminator_is_not_doubled() {
        assert_eq!(strip_record_end("mol\nM  END\n$$$$\n"), "mol\nM  END");
        assert_eq!(strip_record_end("mol\nM  END\n"), "mol\nM  END");
        assert_eq!(strip_record_end("\n\n"), "");
    }

    #[test]
    fn merges_sorted_inputs() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::write(dir.join("ZINC000000000002.sdf"), "two\nM  END\n$$$$\n").unwrap();
        fs::write(dir.join("ZINC000000000001.sdf"), "one\nM  END\n").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let output = dir.join("merged").join("set_1.sdf");
        let report = merge_sdf_dir(&dir, &output).unwrap();
        assert_eq!(report.merged, 2);
        assert_eq!(
            fs::read_to_string(output).unwrap(),
            "one\nM  END\n$$$$\ntwo\nM  END\n$$$$\n"
        );
    }
}
