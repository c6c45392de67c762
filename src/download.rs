use camino::Utf8Path;
use serde::Serialize;

use crate::config::DownloadSettings;
use crate::domain::{LigandFormat, ZincId};
use crate::error::HarvestError;
use crate::ligand::LigandClient;
use crate::pool::run_bounded;
use crate::store::{ClearReport, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchStatus {
    Fetched,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedLigand {
    pub id: ZincId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub requested: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<FailedLigand>,
    pub cleared: Option<ClearReport>,
}

pub struct Downloader<'a, L: LigandClient> {
    client: &'a L,
    format: LigandFormat,
    concurrency: usize,
}

impl<'a, L: LigandClient> Downloader<'a, L> {
    pub fn new(client: &'a L, settings: &DownloadSettings) -> Self {
        Self {
            client,
            format: settings.format,
            concurrency: settings.concurrency,
        }
    }

    /// Fresh run: empties `output_dir`, then fetches every id.
    pub fn download_all(
        &self,
        ids: &[ZincId],
        output_dir: &Utf8Path,
    ) -> Result<DownloadReport, HarvestError> {
        let cleared = Store::clear_dir(output_dir);
        tracing::info!(
            %output_dir,
            removed = cleared.removed,
            failed = cleared.failed,
            "output directory cleared"
        );
        let mut report = self.fetch_all(ids, output_dir)?;
        report.cleared = Some(cleared);
        Ok(report)
    }

    /// Resume path: ids whose file already exists are counted as skipped and
    /// never fetched again.
    pub fn fetch_all(
        &self,
        ids: &[ZincId],
        output_dir: &Utf8Path,
    ) -> Result<DownloadReport, HarvestError> {
        Store::ensure_dir(output_dir)?;
        tracing::info!(
            count = ids.len(),
            concurrency = self.concurrency,
            %output_dir,
            "downloading ligands"
        );

        let statuses = run_bounded(ids.iter().collect(), self.concurrency, |id| {
            self.fetch_one(id, output_dir)
        });

        let mut report = DownloadReport {
            requested: ids.len(),
            ..DownloadReport::default()
        };
        for (id, status) in ids.iter().zip(statuses) {
            match status.unwrap_or_else(|| FetchStatus::Failed("worker panicked".to_string())) {
                FetchStatus::Fetched => report.fetched += 1,
                FetchStatus::Skipped => report.skipped += 1,
                FetchStatus::Failed(reason) => {
                    report.failed += 1;
                    report.failures.push(FailedLigand {
                        id: id.clone(),
                        reason,
                    });
                }
            }
        }
        tracing::info!(
            fetched = report.fetched,
            skipped = report.skipped,
            failed = report.failed,
            "download job finished"
        );
        Ok(report)
    }

    fn fetch_one(&self, id: &ZincId, output_dir: &Utf8Path) -> FetchStatus {
        let target = Store::ligand_path(output_dir, id, self.format);
        if target.as_std_path().exists() {
            tracing::debug!(%id, "already downloaded, skipping");
            return FetchStatus::Skipped;
        }
        match self
            .client
            .download_ligand(id, self.format, target.as_std_path())
        {
            Ok(()) => {
                tracing::debug!(%id, path = %target, "downloaded");
                FetchStatus::Fetched
            }
            Err(err) => {
                tracing::warn!(%id, error = %err, "download failed");
                FetchStatus::Failed(err.to_string())
            }
        }
    }
}
