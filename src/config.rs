use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{FilterBucket, LigandFormat, ZincVersion};
use crate::error::HarvestError;
use crate::http::HttpSettings;
use crate::store::StorePaths;

pub const DEFAULT_CONFIG_FILE: &str = "zinc-harvest.json";
pub const MAX_BUCKETS: usize = 5;
pub const DEFAULT_PAGES_PER_BUCKET: u32 = 50;
pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_QUANTITY: usize = 10;
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://zinc20.docking.org/substances/subsets";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub zinc_version: Option<ZincVersion>,
    #[serde(default)]
    pub format: Option<LigandFormat>,
    #[serde(default)]
    pub pages_per_bucket: Option<u32>,
    #[serde(default)]
    pub scrape_concurrency: Option<usize>,
    #[serde(default)]
    pub download_concurrency: Option<usize>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub debounce_ms: Option<u64>,
    #[serde(default)]
    pub dedup: Option<bool>,
    #[serde(default)]
    pub default_quantity: Option<usize>,
    #[serde(default)]
    pub catalog_base_url: Option<String>,
    #[serde(default)]
    pub ligand_base_url: Option<String>,
    #[serde(default)]
    pub paths: Option<PathsEntry>,
    #[serde(default)]
    pub buckets: Vec<BucketEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PathsEntry {
    #[serde(default)]
    pub bucket_dir: Option<String>,
    #[serde(default)]
    pub work_list: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BucketEntry {
    Shorthand(String),
    Detailed(BucketEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BucketEntryObject {
    pub mw: String,
    pub logp: String,
    #[serde(default)]
    pub quantity: Option<usize>,
}

/// One operator condition: a filter bucket and how many ids to sample from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRequest {
    pub bucket: FilterBucket,
    pub quantity: usize,
}

impl BucketRequest {
    /// Parses `MW:LOGP` or `MW:LOGP:QUANTITY`.
    pub fn parse(value: &str, default_quantity: usize) -> Result<Self, HarvestError> {
        let mut parts = value.trim().splitn(3, ':');
        let (Some(mw), Some(logp)) = (parts.next(), parts.next()) else {
            return Err(HarvestError::InvalidBucket(value.to_string()));
        };
        let bucket: FilterBucket = format!("{mw}:{logp}").parse()?;
        let quantity = match parts.next() {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| HarvestError::InvalidBucket(value.to_string()))?,
            None => default_quantity,
        };
        Ok(Self { bucket, quantity })
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
    pub pages_per_bucket: u32,
    pub concurrency: usize,
    pub dedup: bool,
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub base_url: String,
    pub format: LigandFormat,
    pub concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub zinc_version: ZincVersion,
    pub catalog: CatalogSettings,
    pub download: DownloadSettings,
    pub http: HttpSettings,
    pub debounce: Duration,
    pub default_quantity: usize,
    pub paths: StorePaths,
    pub buckets: Vec<BucketRequest>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `zinc-harvest.json` from the current directory when
    /// no path is given. A missing default file falls back to built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HarvestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HarvestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HarvestError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let zinc_version = config.zinc_version.unwrap_or(ZincVersion::Zinc20);
        let default_quantity = config.default_quantity.unwrap_or(DEFAULT_QUANTITY);

        let pages_per_bucket = config.pages_per_bucket.unwrap_or(DEFAULT_PAGES_PER_BUCKET);
        if pages_per_bucket == 0 {
            return Err(invalid("pages_per_bucket", "must be at least 1"));
        }
        let scrape_concurrency = positive(
            "scrape_concurrency",
            config.scrape_concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        )?;
        let download_concurrency = positive(
            "download_concurrency",
            config.download_concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        )?;
        let debounce_ms = config.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS);
        if debounce_ms == 0 {
            return Err(invalid("debounce_ms", "must be greater than zero"));
        }

        let defaults = HttpSettings::default();
        let http = HttpSettings {
            timeout: config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: config.max_retries.unwrap_or(defaults.max_retries),
        };

        let catalog = CatalogSettings {
            base_url: trim_url(
                config
                    .catalog_base_url
                    .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string()),
            ),
            pages_per_bucket,
            concurrency: scrape_concurrency,
            dedup: config.dedup.unwrap_or(false),
        };
        let download = DownloadSettings {
            base_url: trim_url(
                config
                    .ligand_base_url
                    .unwrap_or_else(|| default_ligand_base_url(zinc_version)),
            ),
            format: config.format.unwrap_or(LigandFormat::Sdf),
            concurrency: download_concurrency,
        };

        let paths_entry = config.paths.unwrap_or_default();
        let defaults = StorePaths::default();
        let paths = StorePaths {
            bucket_dir: paths_entry
                .bucket_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.bucket_dir),
            work_list: paths_entry
                .work_list
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.work_list),
            output_dir: paths_entry
                .output_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.output_dir),
        };

        let buckets = config
            .buckets
            .into_iter()
            .map(|entry| match entry {
                BucketEntry::Shorthand(value) => BucketRequest::parse(&value, default_quantity),
                BucketEntry::Detailed(obj) => Ok(BucketRequest {
                    bucket: FilterBucket::new(obj.mw, obj.logp),
                    quantity: obj.quantity.unwrap_or(default_quantity),
                }),
            })
            .collect::<Result<Vec<_>, HarvestError>>()?;
        if buckets.len() > MAX_BUCKETS {
            return Err(HarvestError::TooManyBuckets {
                count: buckets.len(),
                max: MAX_BUCKETS,
            });
        }

        Ok(ResolvedConfig {
            schema_version,
            zinc_version,
            catalog,
            download,
            http,
            debounce: Duration::from_millis(debounce_ms),
            default_quantity,
            paths,
            buckets,
        })
    }
}

/// The operator form accepted between one and five conditions per run.
pub fn validate_bucket_count(requests: &[BucketRequest]) -> Result<(), HarvestError> {
    match requests.len() {
        0 => Err(HarvestError::NoBuckets),
        count if count > MAX_BUCKETS => Err(HarvestError::TooManyBuckets {
            count,
            max: MAX_BUCKETS,
        }),
        _ => Ok(()),
    }
}

pub fn default_ligand_base_url(version: ZincVersion) -> String {
    format!("https://zinc{version}.docking.org/substances")
}

fn positive(name: &str, value: usize) -> Result<usize, HarvestError> {
    if value == 0 {
        return Err(invalid(name, "must be at least 1"));
    }
    Ok(value)
}

fn invalid(name: &str, message: &str) -> HarvestError {
    HarvestError::InvalidSetting {
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
