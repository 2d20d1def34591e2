//! File-backed scenario catalog with a shared load cache
//!
//! Feature files are parsed once per normalized path set. The cache is the
//! only state shared between concurrently running scenarios.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::common::paths::collect_feature_files;
use crate::common::{Error, Result};
use crate::testing::FeatureFile;

use super::tags::TagFilter;
use super::{ScenarioCatalog, ScenarioDescriptor};

/// Scenario catalog reading YAML feature files from disk
#[derive(Debug, Default)]
pub struct FileScenarioCatalog {
    cache: DashMap<String, Arc<Vec<ScenarioDescriptor>>>,
    loads: AtomicUsize,
}

impl FileScenarioCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every scenario found under `paths`, loading them on first use
    pub fn scenarios(&self, paths: &[PathBuf]) -> Result<Arc<Vec<ScenarioDescriptor>>> {
        let key = normalize_key(paths);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        // The entry holds its shard locked until the closure returns, so a
        // racing caller for the same key waits and then reads the result.
        let entry = self
            .cache
            .entry(key)
            .or_try_insert_with(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                load(paths).map(Arc::new)
            })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Scenarios under `paths` whose tags match `filter`
    pub fn select(&self, filter: &TagFilter, paths: &[PathBuf]) -> Result<Vec<ScenarioDescriptor>> {
        Ok(self
            .scenarios(paths)?
            .iter()
            .filter(|s| filter.matches(&s.tags))
            .cloned()
            .collect())
    }

    /// How many path sets have been read from disk
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn cached_sets(&self) -> usize {
        self.cache.len()
    }
}

impl ScenarioCatalog for FileScenarioCatalog {
    fn find(&self, tag_filter: &str, feature_paths: &[PathBuf]) -> Result<Vec<ScenarioDescriptor>> {
        let filter = TagFilter::parse(tag_filter)?;
        self.select(&filter, feature_paths)
    }
}

/// Cache key of a path set: canonical, sorted, de-duplicated
pub fn normalize_key(paths: &[PathBuf]) -> String {
    let mut normalized: Vec<String> = paths
        .iter()
        .map(|p| {
            p.canonicalize()
                .unwrap_or_else(|_| p.clone())
                .display()
                .to_string()
        })
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized.join("\n")
}

fn load(paths: &[PathBuf]) -> Result<Vec<ScenarioDescriptor>> {
    let mut descriptors = Vec::new();
    for path in paths {
        let files = collect_feature_files(path)
            .map_err(|e| Error::catalog_lookup(&[path.display().to_string()], &e.to_string()))?;
        for file in files {
            tracing::debug!(file = %file.display(), "loading feature file");
            let feature = FeatureFile::load(&file)
                .map_err(|e| lookup_error(paths, &e))?;
            descriptors.extend(
                feature
                    .into_descriptors(&file)
                    .map_err(|e| lookup_error(paths, &e))?,
            );
        }
    }
    Ok(descriptors)
}

fn lookup_error(paths: &[PathBuf], error: &Error) -> Error {
    let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    Error::catalog_lookup(&paths, &error.to_string())
}

/// Resolve a path written in a feature file against that file's directory
pub fn resolve_feature_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path.trim());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
