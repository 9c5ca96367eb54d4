//! Asset store: image records plus their files on disk.
//!
//! Uploads and validation live in the user-facing layer; the
//! orchestrator only reads input assets and creates result assets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::debug;

use tryon_core::{Asset, AssetId, AssetKind, ImageMeta, TryOnError, UserId};

/// Asset records with files stored under `root/{models,garments,results}`.
pub struct AssetStore {
    root: PathBuf,
    records: RwLock<HashMap<AssetId, Asset>>,
}

impl AssetStore {
    /// Create a store rooted at `root`, creating the subdirectories.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, TryOnError> {
        let root = root.into();
        for kind in [AssetKind::Model, AssetKind::Garment, AssetKind::Result] {
            std::fs::create_dir_all(root.join(Self::subdir(kind)))
                .map_err(|e| TryOnError::Storage(e.to_string()))?;
        }
        Ok(Self {
            root,
            records: RwLock::new(HashMap::new()),
        })
    }

    fn subdir(kind: AssetKind) -> &'static str {
        match kind {
            AssetKind::Model => "models",
            AssetKind::Garment => "garments",
            AssetKind::Result => "results",
        }
    }

    /// Absolute path of an asset's file.
    pub fn file_path(&self, asset: &Asset) -> PathBuf {
        self.root.join(Self::subdir(asset.kind)).join(&asset.file_name)
    }

    /// Insert an asset record (upload layer and tests).
    pub async fn insert(&self, asset: Asset) {
        self.records.write().await.insert(asset.id.clone(), asset);
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: &AssetId) -> Option<Asset> {
        self.records.read().await.get(id).cloned()
    }

    /// Resolve an input asset for a submission: must exist, belong to
    /// `owner`, be of `kind`, not deleted, and marked valid.
    pub async fn get_usable(
        &self,
        id: &AssetId,
        owner: &UserId,
        kind: AssetKind,
    ) -> Result<Asset, TryOnError> {
        let records = self.records.read().await;
        let asset = records
            .get(id)
            .filter(|a| !a.deleted && a.kind == kind && &a.owner == owner)
            .ok_or_else(|| TryOnError::AssetNotFound(id.to_string()))?;
        // Past the ownership/kind filter, only validity can fail.
        if !asset.is_usable_by(owner, kind) {
            return Err(TryOnError::AssetNotValid(id.to_string()));
        }
        Ok(asset.clone())
    }

    /// Read an asset's file from disk.
    pub async fn read_file(&self, asset: &Asset) -> Result<Vec<u8>, TryOnError> {
        let path = self.file_path(asset);
        tokio::fs::read(&path)
            .await
            .map_err(|_| TryOnError::AssetFileMissing(asset.id.to_string()))
    }

    /// Check the underlying file exists without reading it.
    pub async fn file_exists(&self, asset: &Asset) -> bool {
        tokio::fs::try_exists(self.file_path(asset))
            .await
            .unwrap_or(false)
    }

    /// Persist result bytes as a new result asset owned by `owner`.
    ///
    /// Writes the file first, then inserts the record, so a failed write
    /// never leaves a dangling record.
    pub async fn create_result(
        &self,
        owner: UserId,
        bytes: Vec<u8>,
        meta: ImageMeta,
        file_stem: &str,
    ) -> Result<Asset, TryOnError> {
        let file_name = format!("{file_stem}.jpg");
        let path = self.root.join(Self::subdir(AssetKind::Result)).join(&file_name);
        let size = bytes.len() as u64;

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| TryOnError::Storage(format!("writing {}: {e}", path.display())))?;

        let asset = Asset::new(
            owner,
            AssetKind::Result,
            &file_name,
            format!("/uploads/results/{file_name}"),
            size,
            "image/jpeg",
            meta,
        );

        debug!(asset_id = %asset.id, file = %file_name, size, "Result asset persisted");
        self.insert(asset.clone()).await;
        Ok(asset)
    }

    /// Soft-delete an asset record if it exists.
    pub async fn soft_delete(&self, id: &AssetId) {
        if let Some(asset) = self.records.write().await.get_mut(id) {
            asset.soft_delete();
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
