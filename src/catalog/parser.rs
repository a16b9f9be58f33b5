//! Catalog document decoding
//!
//! Turns the JSON hierarchy description into a [`MediaTree`]. Each category
//! becomes a group, each video with an mp4 source becomes a playable leaf.
//! Relative URLs are resolved against the category's base URLs.

use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::item::{ItemId, MediaTree, MediaTreeBuilder};
use super::loader::LoadError;
use crate::models::{
    MediaImage, MediaInfo, MediaMetadata, MediaTrack, StreamType, TextTrackSubtype, TrackType,
    DEFAULT_TRACK_MIME_TYPE, DEFAULT_VIDEO_MIME_TYPE, POSTER_HEIGHT, POSTER_WIDTH,
    THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH,
};

/// Only schema version understood by the parser
pub const SUPPORTED_SCHEMA_VERSION: u64 = 1;

/// Source `type` selected for playback
const VIDEO_FORMAT: &str = "mp4";

/// A decoded catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub title: String,
    pub tree: MediaTree,
}

/// Parse a catalog document
pub fn parse_catalog(body: &str) -> Result<Catalog, LoadError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| LoadError::Malformed(e.to_string()))?;

    if !value.is_object() {
        return Err(LoadError::Malformed("top level is not an object".into()));
    }
    if let Some(version) = value.get("version") {
        if version.as_u64() != Some(SUPPORTED_SCHEMA_VERSION) {
            return Err(LoadError::UnsupportedSchema(version.to_string()));
        }
    }

    let document: CatalogDocument = serde_json::from_value(value).map_err(classify_serde_error)?;

    let title = document
        .title
        .or_else(|| document.categories.first().map(|c| c.name.clone()))
        .unwrap_or_default();

    let mut builder = MediaTreeBuilder::new("");
    let bases = BaseUrls::default();
    for category in document.categories {
        decode_category(&mut builder, category, ItemId::ROOT, &bases)?;
    }

    let tree = builder.build();
    debug!(title = %title, nodes = tree.len(), "Decoded catalog");
    Ok(Catalog { title, tree })
}

fn classify_serde_error(e: serde_json::Error) -> LoadError {
    let msg = e.to_string();
    if msg.starts_with("missing field") {
        let field = msg.split('`').nth(1).unwrap_or(msg.as_str());
        LoadError::MissingField(field.to_string())
    } else {
        LoadError::Malformed(msg)
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Base URLs in effect for a category; nested categories inherit them
#[derive(Debug, Clone, Default)]
struct BaseUrls {
    videos: Option<Url>,
    images: Option<Url>,
    tracks: Option<Url>,
}

impl BaseUrls {
    fn inherit(&self, category: &CategoryRaw) -> Result<Self, LoadError> {
        let parse = |raw: &Option<String>, inherited: &Option<Url>| match raw {
            Some(s) => Url::parse(s)
                .map(Some)
                .map_err(|e| LoadError::Malformed(format!("bad base URL '{}': {}", s, e))),
            None => Ok(inherited.clone()),
        };
        Ok(Self {
            videos: parse(&category.mp4, &self.videos)?,
            images: parse(&category.images, &self.images)?,
            tracks: parse(&category.tracks, &self.tracks)?,
        })
    }
}

fn decode_category(
    builder: &mut MediaTreeBuilder,
    category: CategoryRaw,
    parent: ItemId,
    inherited: &BaseUrls,
) -> Result<(), LoadError> {
    let bases = inherited.inherit(&category)?;
    let Some(group) = builder.add_group(category.name.clone(), None, parent) else {
        return Err(LoadError::Malformed(format!(
            "category '{}' has no group to attach to",
            category.name
        )));
    };

    for video in category.videos {
        if let Some(media) = decode_video(video, &bases)? {
            builder.add_leaf(media, group);
        }
    }
    for nested in category.categories {
        decode_category(builder, nested, group, &bases)?;
    }
    Ok(())
}

fn decode_video(video: VideoRaw, bases: &BaseUrls) -> Result<Option<MediaInfo>, LoadError> {
    let Some(source) = video.sources.iter().find(|s| s.kind == VIDEO_FORMAT) else {
        warn!(title = %video.title, "Skipping catalog item without an mp4 source");
        return Ok(None);
    };
    let content_url = resolve_url(&source.url, bases.videos.as_ref())?;
    let content_type = source
        .mime
        .clone()
        .unwrap_or_else(|| DEFAULT_VIDEO_MIME_TYPE.to_string());

    let mut metadata = MediaMetadata {
        title: video.title,
        subtitle: video.subtitle.map(|s| s.replace("\\n", "\n")),
        studio: video.studio,
        poster_url: None,
        images: Vec::new(),
    };
    if let Some(image) = &video.image {
        metadata.images.push(MediaImage {
            url: resolve_url(image, bases.images.as_ref())?,
            width: THUMBNAIL_WIDTH,
            height: THUMBNAIL_HEIGHT,
        });
    }
    if let Some(poster) = &video.poster {
        let url = resolve_url(poster, bases.images.as_ref())?;
        metadata.poster_url = Some(url.clone());
        metadata.images.push(MediaImage {
            url,
            width: POSTER_WIDTH,
            height: POSTER_HEIGHT,
        });
    }

    let tracks = video
        .tracks
        .into_iter()
        .map(|track| decode_track(track, bases))
        .collect::<Result<Vec<_>, _>>()?;

    let duration = video
        .duration
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);

    Ok(Some(MediaInfo {
        content_url,
        content_type,
        stream_type: StreamType::Buffered,
        duration,
        metadata,
        tracks,
    }))
}

fn decode_track(track: TrackRaw, bases: &BaseUrls) -> Result<MediaTrack, LoadError> {
    let id = match &track.id {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    };
    let content_id = track
        .content_id
        .as_deref()
        .map(|c| resolve_url(c, bases.tracks.as_ref()))
        .transpose()?;

    Ok(MediaTrack {
        id,
        content_id,
        content_type: DEFAULT_TRACK_MIME_TYPE.to_string(),
        kind: track
            .kind
            .as_deref()
            .map(TrackType::from_catalog)
            .unwrap_or(TrackType::Unknown),
        subtype: track
            .subtype
            .as_deref()
            .map(TextTrackSubtype::from_catalog)
            .unwrap_or(TextTrackSubtype::Unknown),
        name: track.name,
        language: track.language,
    })
}

/// Absolute http(s) URLs are taken as is, anything else is joined to `base`
fn resolve_url(text: &str, base: Option<&Url>) -> Result<String, LoadError> {
    let text = text.trim();
    let resolved = if text.starts_with("http://") || text.starts_with("https://") {
        Url::parse(text)
    } else {
        let base = base.ok_or_else(|| {
            LoadError::Malformed(format!("relative URL '{}' without a base URL", text))
        })?;
        base.join(text)
    };
    resolved
        .map(|url| url.to_string())
        .map_err(|e| LoadError::Malformed(format!("bad URL '{}': {}", text, e)))
}

// =============================================================================
// Document Structures (internal deserialization)
// =============================================================================

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    title: Option<String>,
    categories: Vec<CategoryRaw>,
}

#[derive(Debug, Deserialize)]
struct CategoryRaw {
    name: String,
    mp4: Option<String>,
    images: Option<String>,
    tracks: Option<String>,
    #[serde(default)]
    videos: Vec<VideoRaw>,
    #[serde(default)]
    categories: Vec<CategoryRaw>,
}

#[derive(Debug, Deserialize)]
struct VideoRaw {
    title: String,
    #[serde(alias = "description")]
    subtitle: Option<String>,
    studio: Option<String>,
    duration: Option<f64>,
    #[serde(rename = "image-480x270")]
    image: Option<String>,
    #[serde(rename = "image-780x1200")]
    poster: Option<String>,
    #[serde(default)]
    sources: Vec<SourceRaw>,
    #[serde(default)]
    tracks: Vec<TrackRaw>,
}

#[derive(Debug, Deserialize)]
struct SourceRaw {
    #[serde(rename = "type")]
    kind: String,
    mime: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct TrackRaw {
    id: Option<serde_json::Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
    subtype: Option<String>,
    #[serde(rename = "contentId")]
    content_id: Option<String>,
    name: Option<String>,
    language: Option<String>,
}
