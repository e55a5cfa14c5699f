//! Record types stored in the local collections.

use crate::{
    codec::base64_bytes, schema::Entity, video::Provider, CollectionKind, LocalId, Order,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary content plus its MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub mime: String,
}

impl Blob {
    pub fn new(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            data,
            mime: mime.into(),
        }
    }

    /// Size of the content in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime == "application/pdf"
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("mime", &self.mime)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Singleton slots for site-wide images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKey {
    BackgroundImage,
    HeaderLogo,
    Favicon,
}

impl AssetKey {
    pub const ALL: [AssetKey; 3] = [
        AssetKey::BackgroundImage,
        AssetKey::HeaderLogo,
        AssetKey::Favicon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKey::BackgroundImage => "backgroundImage",
            AssetKey::HeaderLogo => "headerLogo",
            AssetKey::Favicon => "favicon",
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown asset key: {s}"))
    }
}

/// A site-wide image. Upsert only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub key: AssetKey,
    #[serde(flatten)]
    pub blob: Blob,
    pub updated_at: Timestamp,
}

/// A named photo album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: LocalId,
    pub name: String,
    pub order: Order,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

/// An image belonging to exactly one album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: LocalId,
    pub album_id: LocalId,
    #[serde(flatten)]
    pub blob: Blob,
    pub size: usize,
    pub order: Order,
    pub created_at: Timestamp,
}

/// A PDF essay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Essay {
    pub id: LocalId,
    pub title: String,
    #[serde(flatten)]
    pub blob: Blob,
    pub size: usize,
    pub order: Order,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

/// An embedded video. `embed_id` is derived from `url` once, at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: LocalId,
    pub provider: Provider,
    pub url: String,
    pub embed_id: String,
    pub title: String,
    pub order: Order,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Video {
    pub fn embed_url(&self) -> String {
        crate::video::embed_url(self.provider, &self.embed_id)
    }
}

macro_rules! impl_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: CollectionKind = $kind;

            fn id(&self) -> LocalId {
                self.id
            }

            fn order(&self) -> Order {
                self.order
            }

            fn set_order(&mut self, order: Order) {
                self.order = order;
            }
        }
    };
}

impl_entity!(Album, CollectionKind::Albums);
impl_entity!(Essay, CollectionKind::Essays);
impl_entity!(Video, CollectionKind::Videos);

impl Entity for Photo {
    const KIND: CollectionKind = CollectionKind::Photos;

    fn id(&self) -> LocalId {
        self.id
    }

    fn order(&self) -> Order {
        self.order
    }

    fn set_order(&mut self, order: Order) {
        self.order = order;
    }

    fn scope(&self) -> Option<LocalId> {
        Some(self.album_id)
    }
}
