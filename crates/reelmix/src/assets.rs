//! Bookkeeping of uploaded assets per job.
//!
//! The registry only maps names to stored paths. Whether a file actually
//! exists is checked by the executor when a combination runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AssetError;

/// A previously uploaded file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// One file handed over by upload intake.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub name: String,
    pub stored_path: PathBuf,
}

impl UploadedAsset {
    pub fn new(name: impl Into<String>, stored_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            stored_path: stored_path.into(),
        }
    }

    /// Uses the file name of `stored_path` as the asset name.
    pub fn from_path(stored_path: &Path) -> Option<Self> {
        let name = stored_path.file_name()?.to_str()?.to_string();
        Some(Self::new(name, stored_path))
    }
}

#[derive(Default)]
pub struct AssetRegistry {
    assets: RwLock<HashMap<String, HashMap<String, Asset>>>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, HashMap<String, Asset>>> {
        match self.assets.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Asset registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, HashMap<String, Asset>>> {
        match self.assets.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Asset registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Registers `asset_name` for `job_id`. A second upload under the same
    /// name replaces the first.
    pub fn register(
        &self,
        job_id: &str,
        asset_name: &str,
        path: impl Into<PathBuf>,
        label: Option<String>,
    ) {
        let asset = Asset {
            name: asset_name.to_string(),
            path: path.into(),
            label,
            registered_at: Utc::now(),
        };
        self.write()
            .entry(job_id.to_string())
            .or_default()
            .insert(asset_name.to_string(), asset);
    }

    /// Registers every file of one upload, attaching labels by asset name.
    pub fn register_all(
        &self,
        job_id: &str,
        uploads: &[UploadedAsset],
        labels: &HashMap<String, String>,
    ) -> usize {
        let now = Utc::now();
        let mut assets = self.write();
        let job_assets = assets.entry(job_id.to_string()).or_default();
        for upload in uploads {
            job_assets.insert(
                upload.name.clone(),
                Asset {
                    name: upload.name.clone(),
                    path: upload.stored_path.clone(),
                    label: labels.get(&upload.name).cloned(),
                    registered_at: now,
                },
            );
        }
        log::debug!("Registered {} assets for job {}", uploads.len(), job_id);
        uploads.len()
    }

    pub fn resolve(&self, job_id: &str, asset_name: &str) -> Result<PathBuf, AssetError> {
        self.read()
            .get(job_id)
            .and_then(|assets| assets.get(asset_name))
            .map(|asset| asset.path.clone())
            .ok_or_else(|| AssetError::NotFound {
                job_id: job_id.to_string(),
                asset: asset_name.to_string(),
            })
    }

    /// Assets of a job, sorted by name.
    pub fn assets(&self, job_id: &str) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self
            .read()
            .get(job_id)
            .map(|assets| assets.values().cloned().collect())
            .unwrap_or_default();
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        assets
    }

    pub fn labels(&self, job_id: &str) -> HashMap<String, String> {
        self.read()
            .get(job_id)
            .map(|assets| {
                assets
                    .values()
                    .filter_map(|a| a.label.clone().map(|label| (a.name.clone(), label)))
                    .collect()
            })
            .unwrap_or_default()
    }
}
