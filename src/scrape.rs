use std::collections::HashSet;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::catalog::{self, CatalogClient};
use crate::config::CatalogSettings;
use crate::domain::{FilterBucket, SubsetCode, ZincId, sort_numeric};
use crate::pool::run_bounded;
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BucketOutcome {
    Written {
        bucket: FilterBucket,
        subset: SubsetCode,
        path: Utf8PathBuf,
        count: usize,
        duplicates: usize,
        failed_pages: Vec<u32>,
    },
    /// One of the bucket codes is not in the lookup tables; nothing was fetched.
    Unresolved { bucket: FilterBucket },
    Failed {
        bucket: FilterBucket,
        subset: SubsetCode,
        error: String,
    },
}

/// Ids gathered for one subset before they are persisted.
#[derive(Debug, Default)]
struct Collected {
    ids: Vec<ZincId>,
    duplicates: usize,
    failed_pages: Vec<u32>,
}

pub struct Scraper<'a, C: CatalogClient> {
    client: &'a C,
    settings: &'a CatalogSettings,
}

impl<'a, C: CatalogClient> Scraper<'a, C> {
    pub fn new(client: &'a C, settings: &'a CatalogSettings) -> Self {
        Self { client, settings }
    }

    pub fn scrape_bucket(&self, bucket: &FilterBucket, store: &Store) -> BucketOutcome {
        let mut outcomes = self.scrape_buckets(std::slice::from_ref(bucket), store);
        outcomes.remove(0)
    }

    /// Scrapes every resolvable bucket and writes one artifact per bucket.
    /// All listing pages of all buckets share one bounded pool; outcomes come
    /// back in request order.
    pub fn scrape_buckets(&self, buckets: &[FilterBucket], store: &Store) -> Vec<BucketOutcome> {
        let subsets = buckets
            .iter()
            .map(FilterBucket::resolve)
            .collect::<Vec<_>>();

        let tasks = subsets
            .iter()
            .enumerate()
            .filter_map(|(idx, subset)| subset.map(|subset| (idx, subset)))
            .flat_map(|(idx, subset)| {
                (1..=self.settings.pages_per_bucket).map(move |page| (idx, subset, page))
            })
            .collect::<Vec<_>>();
        let tags = tasks
            .iter()
            .map(|(idx, _, page)| (*idx, *page))
            .collect::<Vec<_>>();

        tracing::info!(
            buckets = buckets.len(),
            pages = tasks.len(),
            concurrency = self.settings.concurrency,
            "scraping catalog"
        );
        let results = run_bounded(tasks, self.settings.concurrency, |(_, subset, page)| {
            self.scrape_page(subset, page)
        });

        let mut collected = buckets
            .iter()
            .map(|_| Collected::default())
            .collect::<Vec<_>>();
        for ((idx, page), result) in tags.into_iter().zip(results) {
            match result {
                Some(Some(ids)) => collected[idx].ids.extend(ids),
                _ => collected[idx].failed_pages.push(page),
            }
        }

        buckets
            .iter()
            .zip(subsets)
            .zip(collected)
            .map(|((bucket, subset), collected)| match subset {
                None => {
                    tracing::warn!(%bucket, "bucket codes not in lookup table, skipping");
                    BucketOutcome::Unresolved {
                        bucket: bucket.clone(),
                    }
                }
                Some(subset) => self.persist(bucket, subset, collected, store),
            })
            .collect()
    }

    fn scrape_page(&self, subset: SubsetCode, page: u32) -> Option<Vec<ZincId>> {
        let html = match self.client.fetch_listing(subset, page) {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(%subset, page, error = %err, "listing page failed");
                return None;
            }
        };
        match catalog::extract_zinc_ids(&html) {
            Ok(ids) => {
                tracing::debug!(%subset, page, found = ids.len(), "listing page parsed");
                Some(ids)
            }
            Err(err) => {
                tracing::warn!(%subset, page, error = %err, "listing page unparsable");
                None
            }
        }
    }

    fn persist(
        &self,
        bucket: &FilterBucket,
        subset: SubsetCode,
        mut collected: Collected,
        store: &Store,
    ) -> BucketOutcome {
        collected.failed_pages.sort_unstable();
        let (ids, duplicates) = if self.settings.dedup {
            dedup(collected.ids)
        } else {
            let duplicates = count_duplicates(&collected.ids);
            (collected.ids, duplicates)
        };
        collected.ids = ids;
        collected.duplicates = duplicates;
        sort_numeric(&mut collected.ids);

        let path = store.bucket_artifact_path(subset);
        match Store::write_ids_atomic(&path, &collected.ids) {
            Ok(()) => {
                tracing::info!(
                    %subset,
                    %path,
                    count = collected.ids.len(),
                    duplicates = collected.duplicates,
                    failed_pages = collected.failed_pages.len(),
                    "bucket artifact written"
                );
                BucketOutcome::Written {
                    bucket: bucket.clone(),
                    subset,
                    path,
                    count: collected.ids.len(),
                    duplicates: collected.duplicates,
                    failed_pages: collected.failed_pages,
                }
            }
            Err(err) => {
                tracing::error!(%subset, %path, error = %err, "cannot write bucket artifact");
                BucketOutcome::Failed {
                    bucket: bucket.clone(),
                    subset,
                    error: err.to_string(),
                }
            }
        }
    }
}

fn count_duplicates(ids: &[ZincId]) -> usize {
    let unique = ids.iter().collect::<HashSet<_>>();
    ids.len() - unique.len()
}

fn dedup(ids: Vec<ZincId>) -> (Vec<ZincId>, usize) {
    let total = ids.len();
    let mut seen = HashSet::with_capacity(total);
    let unique = ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect::<Vec<_>>();
    let removed = total - unique.len();
    (unique, removed)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use camino::Utf8Path;

    use super::*;
    use crate::error::HarvestError;
    use crate::store::StorePaths;

    #[derive(Default)]
    struct PagedCatalog {
        requested: Mutex<Vec<(String, u32)>>,
    }

    impl CatalogClient for PagedCatalog {
        fn fetch_listing(&self, subset: SubsetCode, page: u32) -> Result<String, HarvestError> {
            self.requested.lock().unwrap().push((subset.to_string(), page));
            if page > 1 {
                return Err(HarvestError::CatalogStatus {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            let captions = ["ZINC900", "ZINC12", "ZINC77", "ZINC12"]
                .iter()
                .map(|id| format!(r#"<div class="zinc-id caption">{id}</div>"#))
                .collect::<String>();
            Ok(format!("<html><body>{captions}</body></html>"))
        }
    }

    fn settings(dedup: bool) -> CatalogSettings {
        CatalogSettings {
            base_url: "http://catalog.invalid/subsets".to_string(),
            pages_per_bucket: 2,
            concurrency: 2,
            dedup,
        }
    }

    fn store_in(root: &Utf8Path) -> Store {
        Store::new(StorePaths {
            bucket_dir: root.join("zinc_ids"),
            work_list: root.join("zinc_ids.txt"),
            output_dir: root.join("set_1"),
        })
    }

    fn id(raw: &str) -> ZincId {
        ZincId::normalize(raw).unwrap()
    }

    #[test]
    fn scrape_bucket_writes_numerically_sorted_artifact() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = store_in(&root);
        let catalog = PagedCatalog::default();
        let settings = settings(false);

        let outcome =
            Scraper::new(&catalog, &settings).scrape_bucket(&FilterBucket::new("350", "3"), &store);

        let expected_path = root.join("zinc_ids/zinc_ids_EF.txt");
        assert_matches!(
            &outcome,
            BucketOutcome::Written { path, count: 4, duplicates: 1, failed_pages, .. }
                if *path == expected_path && *failed_pages == vec![2]
        );
        let ids = Store::read_ids(&expected_path).unwrap();
        assert_eq!(
            ids,
            vec![id("ZINC12"), id("ZINC12"), id("ZINC77"), id("ZINC900")]
        );
        let mut requested = catalog.requested.lock().unwrap().clone();
        requested.sort();
        assert_eq!(requested, vec![("EF".to_string(), 1), ("EF".to_string(), 2)]);
    }

    #[test]
    fn scrape_bucket_with_dedup_writes_each_id_once() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = store_in(&root);
        let settings = settings(true);

        let outcome = Scraper::new(&PagedCatalog::default(), &settings)
            .scrape_bucket(&FilterBucket::new("350", "3"), &store);

        assert_matches!(outcome, BucketOutcome::Written { count: 3, duplicates: 1, .. });
        let ids = Store::read_ids(&root.join("zinc_ids/zinc_ids_EF.txt")).unwrap();
        assert_eq!(ids, vec![id("ZINC12"), id("ZINC77"), id("ZINC900")]);
    }

    #[test]
    fn scrape_bucket_skips_unknown_codes_without_fetching() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let catalog = PagedCatalog::default();
        let settings = settings(false);

        let outcome = Scraper::new(&catalog, &settings)
            .scrape_bucket(&FilterBucket::new("999", "3"), &store_in(&root));

        assert_matches!(outcome, BucketOutcome::Unresolved { .. });
        assert!(catalog.requested.lock().unwrap().is_empty());
    }

    #[test]
    fn duplicates_are_counted_not_removed() {
        let ids = vec![id("ZINC1"), id("ZINC2"), id("ZINC1")];
        assert_eq!(count_duplicates(&ids), 1);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let (ids, removed) = dedup(vec![id("ZINC3"), id("ZINC1"), id("ZINC3")]);
        assert_eq!(removed, 1);
        assert_eq!(ids, vec![id("ZINC3"), id("ZINC1")]);
    }
}
