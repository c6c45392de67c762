use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::domain::ZincId;
use crate::error::HarvestError;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRequest {
    pub artifact: Utf8PathBuf,
    pub quantity: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub artifact: Utf8PathBuf,
    pub requested: usize,
    pub available: usize,
}

/// Merged selection across buckets, in request order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkList {
    pub ids: Vec<ZincId>,
    pub selections: Vec<Selection>,
}

impl WorkList {
    pub fn from_ids(ids: Vec<ZincId>) -> Self {
        Self {
            ids,
            selections: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rewrites the work list file in one atomic replace.
    pub fn persist(&self, path: &Utf8Path) -> Result<(), HarvestError> {
        Store::write_ids_atomic(path, &self.ids)
    }

    /// Reads a work list file; fails when it holds no valid id at all.
    pub fn load(path: &Utf8Path) -> Result<Self, HarvestError> {
        let ids = Store::read_ids(path)?;
        if ids.is_empty() {
            return Err(HarvestError::EmptyWorkList(path.to_string()));
        }
        Ok(Self::from_ids(ids))
    }
}

pub struct Sampler;

impl Sampler {
    /// Draws `quantity` ids without replacement from each artifact using the
    /// thread-local, OS-seeded RNG.
    pub fn sample(requests: &[SampleRequest]) -> Result<WorkList, HarvestError> {
        let mut rng = rand::rng();
        Self::sample_with_rng(requests, &mut rng)
    }

    /// Repeated ids in an artifact count once. Any shortfall aborts the
    /// whole run before anything is returned.
    pub fn sample_with_rng<R: Rng + ?Sized>(
        requests: &[SampleRequest],
        rng: &mut R,
    ) -> Result<WorkList, HarvestError> {
        let mut work_list = WorkList::default();
        for request in requests {
            let mut candidates = distinct(Store::read_ids(&request.artifact)?);
            let available = candidates.len();
            if available < request.quantity {
                return Err(HarvestError::SupplyShortfall {
                    artifact: request.artifact.to_string(),
                    requested: request.quantity,
                    available,
                });
            }
            candidates.shuffle(rng);
            candidates.truncate(request.quantity);
            tracing::debug!(
                artifact = %request.artifact,
                requested = request.quantity,
                available,
                "bucket sampled"
            );
            work_list.ids.extend(candidates);
            work_list.selections.push(Selection {
                artifact: request.artifact.clone(),
                requested: request.quantity,
                available,
            });
        }
        Ok(work_list)
    }
}

fn distinct(ids: Vec<ZincId>) -> Vec<ZincId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
