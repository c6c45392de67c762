use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("invalid ZINC identifier: {0}")]
    InvalidZincId(String),

    #[error("invalid bucket specifier: {0}")]
    #[diagnostic(help("use MW:LOGP or MW:LOGP:QUANTITY, e.g. 350:3:25"))]
    InvalidBucket(String),

    #[error("at least one bucket is required")]
    NoBuckets,

    #[error("too many buckets: {count} (at most {max} per run)")]
    TooManyBuckets { count: usize, max: usize },

    #[error("invalid ZINC version: {0} (expected 15 or 20)")]
    InvalidZincVersion(String),

    #[error("invalid setting {name}: {message}")]
    InvalidSetting { name: String, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("failed to parse listing page: {0}")]
    HtmlParse(String),

    #[error("ligand request failed: {0}")]
    LigandHttp(String),

    #[error("ligand server returned status {status} for {id}")]
    LigandStatus { id: String, status: u16 },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("not enough identifiers in {artifact}: requested {requested}, available {available}")]
    #[diagnostic(help("scrape the bucket again or lower the requested quantity"))]
    SupplyShortfall {
        artifact: String,
        requested: usize,
        available: usize,
    },

    #[error("no valid ZINC identifiers found in {0}")]
    EmptyWorkList(String),

    #[error("file watch failed: {0}")]
    Watch(String),

    #[error("pipeline stage channel closed")]
    StageClosed,
}

impl From<notify::Error> for HarvestError {
    fn from(err: notify::Error) -> Self {
        HarvestError::Watch(err.to_string())
    }
}
