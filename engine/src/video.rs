//! Video URL recognition.
//!
//! A video is stored by URL, but playback needs the provider and the
//! provider's embed id. Both are derived once, when the video is created.

use crate::{error::Result, Error};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

const YOUTUBE_PATTERN: &str =
    r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#;
const VIMEO_PATTERN: &str = r"vimeo\.com/(\d+)";

static YOUTUBE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
static VIMEO: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

/// Compile `pattern` on first use and cache the outcome.
fn compiled(
    cell: &'static OnceLock<std::result::Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| Error::Storage(format!("video pattern failed to compile: {e}")))
}

fn youtube() -> Result<&'static Regex> {
    compiled(&YOUTUBE, YOUTUBE_PATTERN)
}

fn vimeo() -> Result<&'static Regex> {
    compiled(&VIMEO, VIMEO_PATTERN)
}

/// Supported video hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    YouTube,
    Vimeo,
}

impl Provider {
    /// Human readable provider name.
    pub fn label(self) -> &'static str {
        match self {
            Provider::YouTube => "YouTube",
            Provider::Vimeo => "Vimeo",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::YouTube => f.write_str("youtube"),
            Provider::Vimeo => f.write_str("vimeo"),
        }
    }
}

/// What a video URL resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub provider: Provider,
    pub embed_id: String,
    pub title: String,
}

impl VideoRef {
    /// URL of the provider's embeddable player.
    pub fn embed_url(&self) -> String {
        embed_url(self.provider, &self.embed_id)
    }
}

/// URL of the provider's embeddable player for an embed id.
pub fn embed_url(provider: Provider, embed_id: &str) -> String {
    match provider {
        Provider::YouTube => format!("https://www.youtube.com/embed/{embed_id}"),
        Provider::Vimeo => format!("https://player.vimeo.com/video/{embed_id}"),
    }
}

/// Derive provider, embed id and default title from a video URL.
///
/// Fails with [`Error::InvalidReference`] when the URL matches neither
/// provider.
pub fn parse_video_url(url: &str) -> Result<VideoRef> {
    let url = url.trim();

    let (provider, embed_id) = if let Some(caps) = youtube()?.captures(url) {
        (Provider::YouTube, caps[1].to_string())
    } else if let Some(caps) = vimeo()?.captures(url) {
        (Provider::Vimeo, caps[1].to_string())
    } else {
        return Err(Error::InvalidReference(format!(
            "unrecognized video URL: {url}"
        )));
    };

    Ok(VideoRef {
        title: format!("{} video {}", provider.label(), embed_id),
        provider,
        embed_id,
    })
}
