//! Remote document shapes for each collection.
//!
//! A shadow record carries the same fields as the local one, minus inline
//! blob data, which is replaced by a `downloadURL`.

use folio_engine::{
    Album, Asset, AssetKey, Blob, Essay, LocalId, Order, Photo, Provider, RemoteDoc, Timestamp,
    Video,
};
use serde::{Deserialize, Serialize};

use crate::error::RemoteResult;
use crate::remote::{from_fields, local_id_of};

/// Path of an asset blob.
pub fn asset_path(key: AssetKey) -> String {
    format!("assets/{key}")
}

/// Path of an essay PDF.
pub fn essay_path(id: LocalId) -> String {
    format!("essays/{id}")
}

/// Path of a photo.
pub fn photo_path(album_id: LocalId, id: LocalId) -> String {
    format!("photos/{album_id}/{id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDoc {
    pub name: String,
    pub order: Order,
    pub created_at: Timestamp,
}

impl AlbumDoc {
    pub fn new(album: &Album) -> Self {
        Self {
            name: album.name.clone(),
            order: album.order,
            created_at: album.created_at,
        }
    }

    pub fn into_album(self, id: LocalId) -> Album {
        Album {
            id,
            name: self.name,
            order: self.order,
            created_at: self.created_at,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDoc {
    pub album_id: LocalId,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub mime: String,
    pub size: usize,
    pub order: Order,
    pub created_at: Timestamp,
}

impl PhotoDoc {
    pub fn new(photo: &Photo, download_url: String) -> Self {
        Self {
            album_id: photo.album_id,
            download_url,
            mime: photo.blob.mime.clone(),
            size: photo.size,
            order: photo.order,
            created_at: photo.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssayDoc {
    pub title: String,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub mime: String,
    pub size: usize,
    pub order: Order,
    pub created_at: Timestamp,
}

impl EssayDoc {
    pub fn new(essay: &Essay, download_url: String) -> Self {
        Self {
            title: essay.title.clone(),
            download_url,
            mime: essay.blob.mime.clone(),
            size: essay.size,
            order: essay.order,
            created_at: essay.created_at,
        }
    }

    pub fn into_essay(self, id: LocalId, blob: Blob) -> Essay {
        Essay {
            id,
            title: self.title,
            size: blob.size(),
            blob,
            order: self.order,
            created_at: self.created_at,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDoc {
    pub provider: Provider,
    pub url: String,
    pub embed_id: String,
    pub title: String,
    pub order: Order,
    pub created_at: Timestamp,
}

impl VideoDoc {
    pub fn new(video: &Video) -> Self {
        Self {
            provider: video.provider,
            url: video.url.clone(),
            embed_id: video.embed_id.clone(),
            title: video.title.clone(),
            order: video.order,
            created_at: video.created_at,
        }
    }

    pub fn into_video(self, id: LocalId) -> Video {
        Video {
            id,
            provider: self.provider,
            url: self.url,
            embed_id: self.embed_id,
            title: self.title,
            order: self.order,
            created_at: self.created_at,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDoc {
    pub key: AssetKey,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub mime: String,
    pub updated_at: Timestamp,
}

impl AssetDoc {
    pub fn new(asset: &Asset, download_url: String) -> Self {
        Self {
            key: asset.key,
            download_url,
            mime: asset.blob.mime.clone(),
            updated_at: asset.updated_at,
        }
    }
}

/// Decode a shadow document into its local id and shape.
pub fn decode<T: serde::de::DeserializeOwned>(doc: &RemoteDoc) -> RemoteResult<(LocalId, T)> {
    Ok((local_id_of(doc)?, from_fields(doc)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::to_fields;
    use serde_json::json;

    #[test]
    fn blob_paths() {
        assert_eq!(asset_path(AssetKey::HeaderLogo), "assets/headerLogo");
        assert_eq!(essay_path(4), "essays/4");
        assert_eq!(photo_path(2, 9), "photos/2/9");
    }

    #[test]
    fn essay_shape() {
        let essay = Essay {
            id: 3,
            title: "On Light".into(),
            blob: Blob::new(b"%PDF".to_vec(), "application/pdf"),
            size: 4,
            order: 2,
            created_at: 100,
            updated_at: None,
        };
        let fields = to_fields(&EssayDoc::new(&essay, "http://m/v1/blobs/essays/3".into())).unwrap();
        assert_eq!(
            serde_json::Value::Object(fields),
            json!({
                "title": "On Light",
                "downloadURL": "http://m/v1/blobs/essays/3",
                "mime": "application/pdf",
                "size": 4,
                "order": 2,
                "createdAt": 100
            })
        );
    }

    #[test]
    fn decode_video_doc() {
        let doc: RemoteDoc = serde_json::from_value(json!({
            "remoteId": "r1",
            "localId": 7,
            "provider": "vimeo",
            "url": "https://vimeo.com/1",
            "embedId": "1",
            "title": "Vimeo video 1",
            "order": 1,
            "createdAt": 5
        }))
        .unwrap();

        let (id, shape): (LocalId, VideoDoc) = decode(&doc).unwrap();
        let video = shape.into_video(id);
        assert_eq!(video.id, 7);
        assert_eq!(video.provider, Provider::Vimeo);
        assert_eq!(video.embed_url(), folio_engine::video::embed_url(Provider::Vimeo, "1"));
    }
}
