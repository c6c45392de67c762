use std::io;
use std::path::Path;

use reqwest::blocking::Client;
use tempfile::NamedTempFile;

use crate::domain::{LigandFormat, ZincId};
use crate::error::HarvestError;
use crate::http::{self, HttpSettings};

pub trait LigandClient: Send + Sync {
    /// Fetches one ligand file and writes it to `destination`. Nothing may be
    /// left at `destination` when this returns an error.
    fn download_ligand(
        &self,
        id: &ZincId,
        format: LigandFormat,
        destination: &Path,
    ) -> Result<(), HarvestError>;
}

#[derive(Clone)]
pub struct LigandHttpClient {
    client: Client,
    base_url: String,
    max_retries: usize,
}

impl LigandHttpClient {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, HarvestError> {
        Ok(Self {
            client: http::build_client(settings)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
        })
    }

    pub fn ligand_url(base_url: &str, id: &ZincId, format: LigandFormat) -> String {
        format!(
            "{}/{}.{}",
            base_url.trim_end_matches('/'),
            id.as_str(),
            format.extension()
        )
    }
}

impl LigandClient for LigandHttpClient {
    fn download_ligand(
        &self,
        id: &ZincId,
        format: LigandFormat,
        destination: &Path,
    ) -> Result<(), HarvestError> {
        let url = Self::ligand_url(&self.base_url, id, format);
        let mut response = http::send_with_retries(self.max_retries, || self.client.get(&url))
            .map_err(|err| HarvestError::LigandHttp(err.to_string()))?;
        if !response.status().is_success() {
            return Err(HarvestError::LigandStatus {
                id: id.to_string(),
                status: response.status().as_u16(),
            });
        }

        let parent = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(parent)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        io::copy(&mut response, &mut temp)
            .map_err(|err| HarvestError::LigandHttp(format!("{id}: {err}")))?;
        temp.persist(destination)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
