//! Export documents for backing up and restoring the whole store.
//!
//! An export is a deep, self-describing snapshot: every blob is inlined as
//! a data URL, so the document alone is enough to rebuild the store on
//! another device. Import is destructive and version-gated.

use crate::{
    error::Result, record::AssetKey, schema::SCHEMA_VERSION, CollectionKind, Error, LocalId,
    Order, SchemaVersion, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A full export of the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Schema version tag, checked on import
    pub version: SchemaVersion,
    /// When the export was taken (RFC 3339)
    pub timestamp: String,
    #[serde(default)]
    pub assets: BTreeMap<AssetKey, AssetExport>,
    #[serde(default)]
    pub albums: Vec<AlbumExport>,
    #[serde(default)]
    pub photos: Vec<PhotoExport>,
    #[serde(default)]
    pub essays: Vec<EssayExport>,
    #[serde(default)]
    pub videos: Vec<VideoExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetExport {
    pub key: AssetKey,
    /// Data URL
    pub data: String,
    pub mime: String,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumExport {
    pub id: LocalId,
    pub name: String,
    pub order: Order,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoExport {
    pub id: LocalId,
    pub album_id: LocalId,
    pub order: Order,
    pub created_at: Timestamp,
    /// Data URL
    pub data: String,
    pub mime: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssayExport {
    pub id: LocalId,
    pub title: String,
    pub order: Order,
    pub created_at: Timestamp,
    /// Data URL
    pub data: String,
    pub mime: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoExport {
    pub id: LocalId,
    /// Informational; re-derived from `url` on import
    pub provider: String,
    pub url: String,
    pub embed_id: String,
    pub title: String,
    pub order: Order,
    pub created_at: Timestamp,
}

/// Just enough of a document to read its version tag.
#[derive(Deserialize)]
struct VersionProbe {
    version: SchemaVersion,
}

impl ExportDocument {
    /// Create an empty document for the current schema.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            timestamp: timestamp.into(),
            assets: BTreeMap::new(),
            albums: Vec::new(),
            photos: Vec::new(),
            essays: Vec::new(),
            videos: Vec::new(),
        }
    }

    /// Fail with [`Error::IncompatibleVersion`] unless the tag matches.
    pub fn check_version(&self) -> Result<()> {
        check_version(self.version)
    }

    /// Count records per collection.
    pub fn summary(&self) -> ExportSummary {
        ExportSummary::from(self)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Parse a document, checking the version tag before anything else.
    pub fn from_json(json: &str) -> Result<Self> {
        let probe: VersionProbe =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        check_version(probe.version)?;

        serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }
}

fn check_version(actual: SchemaVersion) -> Result<()> {
    if actual != SCHEMA_VERSION {
        return Err(Error::IncompatibleVersion {
            expected: SCHEMA_VERSION,
            actual,
        });
    }
    Ok(())
}

/// Record counts of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub version: SchemaVersion,
    pub timestamp: String,
    pub counts: BTreeMap<CollectionKind, usize>,
}

impl From<&ExportDocument> for ExportSummary {
    fn from(doc: &ExportDocument) -> Self {
        let counts = BTreeMap::from([
            (CollectionKind::Assets, doc.assets.len()),
            (CollectionKind::Albums, doc.albums.len()),
            (CollectionKind::Photos, doc.photos.len()),
            (CollectionKind::Essays, doc.essays.len()),
            (CollectionKind::Videos, doc.videos.len()),
        ]);
        Self {
            version: doc.version,
            timestamp: doc.timestamp.clone(),
            counts,
        }
    }
}

/// An item import left out, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedItem {
    pub collection: CollectionKind,
    /// Id (or asset key) in the imported document
    pub source: String,
    pub reason: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub assets: usize,
    pub albums: usize,
    pub photos: usize,
    pub essays: usize,
    pub videos: usize,
    pub skipped: Vec<SkippedItem>,
}

impl ImportReport {
    pub(crate) fn skip(
        &mut self,
        collection: CollectionKind,
        source: impl ToString,
        reason: impl ToString,
    ) {
        self.skipped.push(SkippedItem {
            collection,
            source: source.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Records written across all collections.
    pub fn imported(&self) -> usize {
        self.assets + self.albums + self.photos + self.essays + self.videos
    }
}
