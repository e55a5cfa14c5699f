//! Blob codec: binary content to transport-safe text and back.
//!
//! Exports inline every blob as a data URL (`data:<mime>;base64,<payload>`).
//! Decoding also accepts bare base64, treating the content as
//! `application/octet-stream`.

use crate::{error::Result, record::Blob, Error};
use base64::{engine::general_purpose::STANDARD, Engine};

/// MIME type assumed when the encoded text carries none.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Encode raw bytes as base64 text.
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text into raw bytes.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| Error::InvalidSnapshot(format!("invalid base64 payload: {e}")))
}

/// Encode a blob as a data URL.
pub fn encode(blob: &Blob) -> String {
    format!("data:{};base64,{}", blob.mime, encode_bytes(&blob.data))
}

/// Decode a data URL (or bare base64) into a blob.
pub fn decode(text: &str) -> Result<Blob> {
    let Some(rest) = text.strip_prefix("data:") else {
        return Ok(Blob::new(decode_bytes(text)?, DEFAULT_MIME));
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidSnapshot("data URL without payload".into()))?;

    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| Error::InvalidSnapshot("data URL is not base64 encoded".into()))?;
    let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };

    Ok(Blob::new(decode_bytes(payload)?, mime))
}

/// Serde adapter storing `Vec<u8>` as base64 text.
pub mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_bytes(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_bytes(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_format() {
        let blob = Blob::new(b"hi".to_vec(), "image/png");
        assert_eq!(encode(&blob), "data:image/png;base64,aGk=");
    }

    #[test]
    fn decode_data_url() {
        let blob = decode("data:application/pdf;base64,JVBERi0=").unwrap();
        assert_eq!(blob.mime, "application/pdf");
        assert_eq!(blob.data, b"%PDF-");
    }

    #[test]
    fn decode_bare_base64() {
        let blob = decode("aGk=").unwrap();
        assert_eq!(blob.mime, DEFAULT_MIME);
        assert_eq!(blob.data, b"hi");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode("data:image/png,abc"), Err(Error::InvalidSnapshot(_))));
        assert!(matches!(decode("data:image/png;base64"), Err(Error::InvalidSnapshot(_))));
        assert!(matches!(decode("not base64!"), Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn binary_content_survives() {
        let data: Vec<u8> = (0..=255).collect();
        let blob = Blob::new(data.clone(), "image/jpeg");
        let decoded = decode(&encode(&blob)).unwrap();
        assert_eq!(decoded.data, data);
        assert_eq!(decoded.mime, "image/jpeg");
    }
}
