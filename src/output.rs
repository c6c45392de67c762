use std::io::{self, Write};

use serde::Serialize;

use crate::app::{DownloadResult, ProgressEvent, ProgressSink, RunResult, SampleResult, ScrapeResult};
use crate::scrape::BucketOutcome;
use crate::sdf::MergeReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_scrape(result: &ScrapeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_sample(result: &SampleResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_download(result: &DownloadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_merge(result: &MergeReport) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Human-readable summaries printed at the end of interactive runs.
pub struct Summary;

impl Summary {
    pub fn print_scrape(result: &ScrapeResult) {
        println!("{CYAN}Scrape summary{RESET}");
        for outcome in &result.buckets {
            match outcome {
                BucketOutcome::Written {
                    bucket,
                    path,
                    count,
                    duplicates,
                    failed_pages,
                    ..
                } => {
                    let color = if failed_pages.is_empty() { GREEN } else { YELLOW };
                    println!("{color}  {bucket}: {count} ids -> {path}{RESET}");
                    if *duplicates > 0 {
                        println!("{YELLOW}     duplicates: {duplicates}{RESET}");
                    }
                    if !failed_pages.is_empty() {
                        println!("{YELLOW}     failed pages: {failed_pages:?}{RESET}");
                    }
                }
                BucketOutcome::Unresolved { bucket } => {
                    println!("{YELLOW}  {bucket}: unknown bucket codes, skipped{RESET}");
                }
                BucketOutcome::Failed { bucket, error, .. } => {
                    println!("{RED}  {bucket}: {error}{RESET}");
                }
            }
        }
    }

    pub fn print_sample(result: &SampleResult) {
        println!("{CYAN}Sample summary{RESET}");
        if result.stale_removed {
            println!("{YELLOW}  removed previous work list{RESET}");
        }
        for selection in &result.selections {
            println!(
                "{GREEN}  {}: {} of {}{RESET}",
                selection.artifact, selection.requested, selection.available
            );
        }
        for bucket in &result.skipped {
            println!("{YELLOW}  {bucket}: unknown bucket codes, skipped{RESET}");
        }
        for bucket in &result.failed {
            println!("{RED}  {bucket}: artifact not written, skipped{RESET}");
        }
        println!("{GREEN}  {} ids -> {}{RESET}", result.count, result.work_list);
    }

    pub fn print_download(result: &DownloadResult) {
        let report = &result.report;
        println!("{CYAN}Download summary ({}){RESET}", result.output_dir);
        if let Some(cleared) = &report.cleared {
            println!("{YELLOW}  cleared: {} entries{RESET}", cleared.removed);
            if let Some(error) = &cleared.listing_error {
                println!("{RED}  could not list output directory: {error}{RESET}");
            }
        }
        println!("{GREEN}  fetched: {}{RESET}", report.fetched);
        println!("{GREEN}  skipped: {}{RESET}", report.skipped);
        let color = if report.failed == 0 { GREEN } else { RED };
        println!("{color}  failed:  {}{RESET}", report.failed);
        for failure in &report.failures {
            println!("{RED}    {}: {}{RESET}", failure.id, failure.reason);
        }
    }

    pub fn print_run(result: &RunResult) {
        Self::print_scrape(&result.scrape);
        Self::print_sample(&result.sample);
        match &result.download {
            Some(download) => Self::print_download(download),
            None => println!("{YELLOW}Nothing to download{RESET}"),
        }
    }

    pub fn print_merge(result: &MergeReport) {
        println!(
            "{GREEN}Merged {} SDF file(s) into {}{RESET}",
            result.merged, result.output
        );
        for path in &result.skipped {
            println!("{YELLOW}  skipped: {path}{RESET}");
        }
    }
}
