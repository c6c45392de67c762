use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::catalog::CatalogClient;
use crate::config::{BucketRequest, ResolvedConfig, validate_bucket_count};
use crate::domain::FilterBucket;
use crate::download::{DownloadReport, Downloader};
use crate::error::HarvestError;
use crate::ligand::LigandClient;
use crate::sampler::{SampleRequest, Sampler, Selection, WorkList};
use crate::scrape::{BucketOutcome, Scraper};
use crate::sdf::{self, MergeReport};
use crate::store::Store;
use crate::watch::{self, WorkListReady};

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    pub started_at: String,
    pub finished_at: String,
    pub buckets: Vec<BucketOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleResult {
    pub created_at: String,
    pub work_list: Utf8PathBuf,
    pub stale_removed: bool,
    pub count: usize,
    pub selections: Vec<Selection>,
    pub skipped: Vec<FilterBucket>,
    /// Buckets whose artifact could not be written in the same run.
    pub failed: Vec<FilterBucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub started_at: String,
    pub finished_at: String,
    pub work_list: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub resumed: bool,
    pub report: DownloadReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub scrape: ScrapeResult,
    pub sample: SampleResult,
    pub download: Option<DownloadResult>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Forwards progress to the log; used for interactive runs.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => tracing::info!("{}", event.message),
        }
    }
}

pub struct App<C: CatalogClient, L: LigandClient> {
    store: Store,
    catalog: C,
    ligands: L,
    config: ResolvedConfig,
}

impl<C: CatalogClient, L: LigandClient> App<C, L> {
    pub fn new(config: ResolvedConfig, catalog: C, ligands: L) -> Self {
        Self {
            store: Store::new(config.paths.clone()),
            catalog,
            ligands,
            config,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Buckets given on the command line win over the configured ones.
    pub fn requests_or_configured(&self, requests: Vec<BucketRequest>) -> Vec<BucketRequest> {
        if requests.is_empty() {
            self.config.buckets.clone()
        } else {
            requests
        }
    }

    pub fn scrape(
        &self,
        requests: &[BucketRequest],
        sink: &dyn ProgressSink,
    ) -> Result<ScrapeResult, HarvestError> {
        validate_bucket_count(requests)?;
        let started_at = iso_timestamp();
        let start = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Scrape; {} bucket(s)", requests.len()),
            elapsed: None,
        });

        let buckets = requests
            .iter()
            .map(|request| request.bucket.clone())
            .collect::<Vec<_>>();
        let outcomes =
            Scraper::new(&self.catalog, &self.config.catalog).scrape_buckets(&buckets, &self.store);

        sink.event(ProgressEvent {
            message: "phase=Scrape; bucket artifacts written".to_string(),
            elapsed: Some(start.elapsed()),
        });
        Ok(ScrapeResult {
            started_at,
            finished_at: iso_timestamp(),
            buckets: outcomes,
        })
    }

    /// Draws the requested quantities from the bucket artifacts and rewrites
    /// the work list. A work list from an earlier run is removed first, so a
    /// shortfall never leaves stale ids behind for the downloader.
    pub fn sample(
        &self,
        requests: &[BucketRequest],
        sink: &dyn ProgressSink,
    ) -> Result<SampleResult, HarvestError> {
        self.sample_excluding(requests, &[], sink)
    }

    /// Samples every bucket except those listed in `failed`, whose artifacts
    /// may still hold ids from an earlier scrape.
    fn sample_excluding(
        &self,
        requests: &[BucketRequest],
        failed: &[FilterBucket],
        sink: &dyn ProgressSink,
    ) -> Result<SampleResult, HarvestError> {
        let stale_removed = self.store.remove_work_list()?;
        if stale_removed {
            tracing::info!(path = %self.store.work_list_path(), "removed stale work list");
        }
        validate_bucket_count(requests)?;
        sink.event(ProgressEvent {
            message: format!("phase=Sample; {} bucket(s)", requests.len()),
            elapsed: None,
        });

        let mut skipped = Vec::new();
        let mut excluded = Vec::new();
        let mut sample_requests = Vec::with_capacity(requests.len());
        for request in requests {
            if failed.contains(&request.bucket) {
                tracing::warn!(bucket = %request.bucket, "bucket artifact not refreshed, skipping");
                excluded.push(request.bucket.clone());
                continue;
            }
            match request.bucket.resolve() {
                Some(subset) => sample_requests.push(SampleRequest {
                    artifact: self.store.bucket_artifact_path(subset),
                    quantity: request.quantity,
                }),
                None => {
                    tracing::warn!(bucket = %request.bucket, "bucket codes not in lookup table, skipping");
                    skipped.push(request.bucket.clone());
                }
            }
        }

        let work_list = Sampler::sample(&sample_requests)?;
        let path = self.store.work_list_path().to_path_buf();
        if work_list.is_empty() {
            tracing::warn!(%path, "nothing sampled, work list not written");
        } else {
            work_list.persist(&path)?;
            tracing::info!(%path, count = work_list.len(), "work list written");
        }

        Ok(SampleResult {
            created_at: iso_timestamp(),
            work_list: path,
            stale_removed,
            count: work_list.len(),
            selections: work_list.selections,
            skipped,
            failed: excluded,
        })
    }

    /// Downloads the ligands of the current work list. Without `resume` the
    /// output directory is emptied first.
    pub fn download(
        &self,
        resume: bool,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadResult, HarvestError> {
        sink.event(ProgressEvent {
            message: format!("phase=Download; reading {}", self.store.work_list_path()),
            elapsed: None,
        });
        let start = Instant::now();
        let result = self.download_work_list(self.store.work_list_path(), resume)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Download; fetched={} skipped={} failed={}",
                result.report.fetched, result.report.skipped, result.report.failed
            ),
            elapsed: Some(start.elapsed()),
        });
        Ok(result)
    }

    /// Scrape, sample and download in one process. The download stage runs
    /// on its own thread and starts when the sample stage hands it the
    /// finished work list.
    pub fn run(
        &self,
        requests: &[BucketRequest],
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, HarvestError> {
        let (ready_tx, ready_rx) = mpsc::channel::<WorkListReady>();

        thread::scope(|scope| -> Result<RunResult, HarvestError> {
            let download_stage = scope.spawn(move || match ready_rx.recv() {
                Ok(ready) => {
                    tracing::info!(generation = ready.generation, "download stage started");
                    self.download_work_list(&ready.path, false).map(Some)
                }
                Err(_) => Ok(None),
            });

            let staged = self.scrape_and_sample(requests, sink, &ready_tx);
            drop(ready_tx);

            let download = download_stage
                .join()
                .map_err(|_| HarvestError::StageClosed)??;
            let (scrape, sample) = staged?;
            if let Some(result) = &download {
                sink.event(ProgressEvent {
                    message: format!(
                        "phase=Download; fetched={} skipped={} failed={}",
                        result.report.fetched, result.report.skipped, result.report.failed
                    ),
                    elapsed: None,
                });
            }
            Ok(RunResult {
                scrape,
                sample,
                download,
            })
        })
    }

    /// Watches the work list and runs a fresh download after every stable
    /// write. Returns only when watching fails.
    pub fn watch<F>(&self, sink: &dyn ProgressSink, mut on_download: F) -> Result<(), HarvestError>
    where
        F: FnMut(&DownloadResult),
    {
        let work_list = self.store.work_list_path();
        sink.event(ProgressEvent {
            message: format!("phase=Watch; waiting for {work_list}"),
            elapsed: None,
        });
        let (ready_tx, ready_rx) = mpsc::channel::<WorkListReady>();

        thread::scope(|scope| -> Result<(), HarvestError> {
            let watcher = scope
                .spawn(move || watch::watch_work_list(work_list, self.config.debounce, ready_tx));

            watch::run_download_runner(&ready_rx, |ready| {
                sink.event(ProgressEvent {
                    message: format!("phase=Download; work list generation {}", ready.generation),
                    elapsed: None,
                });
                match self.download_work_list(&ready.path, false) {
                    Ok(result) => on_download(&result),
                    Err(err) => tracing::error!(error = %err, "download run failed"),
                }
            });

            watcher
                .join()
                .map_err(|_| HarvestError::Watch("watcher thread panicked".to_string()))?
        })
    }

    /// Concatenates the downloaded SDF files. The default target is the
    /// output directory name with an `.sdf` extension, next to it.
    pub fn merge(
        &self,
        output: Option<&Utf8Path>,
        sink: &dyn ProgressSink,
    ) -> Result<MergeReport, HarvestError> {
        let target = match output {
            Some(path) => path.to_path_buf(),
            None => self.store.output_dir().with_extension("sdf"),
        };
        sink.event(ProgressEvent {
            message: format!("phase=Merge; writing {target}"),
            elapsed: None,
        });
        sdf::merge_sdf_dir(self.store.output_dir(), &target)
    }

    fn scrape_and_sample(
        &self,
        requests: &[BucketRequest],
        sink: &dyn ProgressSink,
        ready: &Sender<WorkListReady>,
    ) -> Result<(ScrapeResult, SampleResult), HarvestError> {
        let scrape = self.scrape(requests, sink)?;
        let failed = scrape
            .buckets
            .iter()
            .filter_map(|outcome| match outcome {
                BucketOutcome::Failed { bucket, .. } => Some(bucket.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        let sample = self.sample_excluding(requests, &failed, sink)?;
        if sample.count > 0 {
            ready
                .send(WorkListReady {
                    generation: 1,
                    path: sample.work_list.clone(),
                })
                .map_err(|_| HarvestError::StageClosed)?;
        }
        Ok((scrape, sample))
    }

    fn download_work_list(
        &self,
        path: &Utf8Path,
        resume: bool,
    ) -> Result<DownloadResult, HarvestError> {
        let started_at = iso_timestamp();
        let work_list = WorkList::load(path)?;
        let downloader = Downloader::new(&self.ligands, &self.config.download);
        let output_dir = self.store.output_dir();
        let report = if resume {
            downloader.fetch_all(&work_list.ids, output_dir)?
        } else {
            downloader.download_all(&work_list.ids, output_dir)?
        };
        Ok(DownloadResult {
            started_at,
            finished_at: iso_timestamp(),
            work_list: path.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            resumed: resume,
            report,
        })
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
