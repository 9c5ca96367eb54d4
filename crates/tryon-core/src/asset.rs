//! Asset records: uploaded inputs and generated results.
//!
//! The orchestrator treats model and garment assets as read-only;
//! it only ever creates new `Result` assets.

use crate::{AssetId, GarmentCategory, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an asset record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// A user-uploaded model (person) image.
    Model,
    /// A user-uploaded garment image.
    Garment,
    /// A generated try-on result image.
    Result,
}

/// Denormalized image metadata carried on an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    /// Garment category, present on garment and result assets.
    pub category: Option<GarmentCategory>,
}

impl ImageMeta {
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.height == 0 {
            return None;
        }
        Some(f64::from(self.width) / f64::from(self.height))
    }
}

/// An immutable file record with a validity flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub owner: UserId,
    pub kind: AssetKind,

    /// Stored file name within the kind's storage subdirectory.
    pub file_name: String,

    /// Public URL the file is served from.
    pub file_url: String,

    pub size_bytes: u64,
    pub mime_type: String,
    pub meta: ImageMeta,

    /// Whether the upload-validation step accepted this image.
    /// Result assets are always valid.
    pub valid: bool,

    pub created_at: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// Create a new asset record.
    pub fn new(
        owner: UserId,
        kind: AssetKind,
        file_name: impl Into<String>,
        file_url: impl Into<String>,
        size_bytes: u64,
        mime_type: impl Into<String>,
        meta: ImageMeta,
    ) -> Self {
        Self {
            id: AssetId::generate(),
            owner,
            kind,
            file_name: file_name.into(),
            file_url: file_url.into(),
            size_bytes,
            mime_type: mime_type.into(),
            meta,
            valid: true,
            created_at: Utc::now(),
            deleted: false,
            deleted_at: None,
        }
    }

    /// Builder method to set validity (for uploads pending validation).
    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    /// Returns true if this asset can be used as a try-on input by `owner`.
    pub fn is_usable_by(&self, owner: &UserId, kind: AssetKind) -> bool {
        !self.deleted && self.valid && self.kind == kind && &self.owner == owner
    }

    /// Mark the asset as soft-deleted.
    pub fn soft_delete(&mut self) {
        self.deleted = true;
        self.deleted_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ImageMeta {
        ImageMeta {
            width: 800,
            height: 1200,
            category: Some(GarmentCategory::Upper),
        }
    }

    #[test]
    fn test_usable_by_checks_owner_kind_and_flags() {
        let owner = UserId::generate();
        let other = UserId::generate();
        let mut asset = Asset::new(
            owner.clone(),
            AssetKind::Garment,
            "g.jpg",
            "/uploads/garments/g.jpg",
            123,
            "image/jpeg",
            meta(),
        );

        assert!(asset.is_usable_by(&owner, AssetKind::Garment));
        assert!(!asset.is_usable_by(&other, AssetKind::Garment));
        assert!(!asset.is_usable_by(&owner, AssetKind::Model));

        asset.soft_delete();
        assert!(!asset.is_usable_by(&owner, AssetKind::Garment));
        assert!(asset.deleted_at.is_some());
    }

    #[test]
    fn test_aspect_ratio() {
        let m = meta();
        assert_eq!(m.aspect_ratio(), Some(800.0 / 1200.0));
    }
}
