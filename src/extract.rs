//! Per-item metadata extraction: canonical URL, hashtags, display fields.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::feed::{MediaItem, MediaKind};
use crate::humanize;

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\S+").unwrap());

// Matches CDN path segments like /s640x640/ that select a scaled rendition.
static DIMENSION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/s\d{3,}x\d{3,}/").unwrap());

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("item {id} has no {kind:?} resolution variants")]
    MissingVariant { id: String, kind: MediaKind },
}

/// One output row. Serde renames map the fields straight onto the CSV
/// header `Account,Likes,Posted,URL,Img,Hashtags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Likes")]
    pub likes: u64,
    #[serde(rename = "Posted")]
    pub posted: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Img")]
    pub img: String,
    #[serde(rename = "Hashtags")]
    pub hashtags: String,
}

/// Derive the flat metadata record for one feed item. Pure over its inputs;
/// `now` is the epoch used for the relative `Posted` display.
///
/// # Errors
///
/// `ExtractError::MissingVariant` if the item carries no resolution set for
/// its own media type.
pub fn extract(item: &MediaItem, account: &str, now: i64) -> Result<MediaRecord, ExtractError> {
    let url = canonical_url(item)?;
    let img = url.rsplit('/').next().unwrap_or(&url).to_string();

    Ok(MediaRecord {
        account: account.to_string(),
        likes: item.likes.count,
        posted: humanize::relative(item.created_time, now),
        hashtags: hashtags(item).join(", "),
        url,
        img,
    })
}

/// The original/largest rendition URL: the item's typed standard-resolution
/// variant with the query string and any `/s{W}x{H}/` dimension segment
/// stripped. Idempotent on already-canonical input.
///
/// # Errors
///
/// `ExtractError::MissingVariant` if the variant set for the item's type is
/// absent.
pub fn canonical_url(item: &MediaItem) -> Result<String, ExtractError> {
    let variants = match item.kind {
        MediaKind::Image => item.images.as_ref(),
        MediaKind::Video => item.videos.as_ref(),
    }
    .ok_or_else(|| ExtractError::MissingVariant {
        id: item.id.clone(),
        kind: item.kind,
    })?;

    let raw = &variants.standard_resolution.url;
    let without_query = raw.split('?').next().unwrap_or(raw);
    Ok(DIMENSION_SEGMENT.replace_all(without_query, "/").into_owned())
}

/// Hashtags from the caption (when present) and every comment, in
/// first-seen order with exact-case duplicates removed.
#[must_use]
pub fn hashtags(item: &MediaItem) -> Vec<String> {
    let caption = item.caption.as_ref().map(|c| c.text.as_str());
    let texts = caption
        .into_iter()
        .chain(item.comments.data.iter().map(|c| c.text.as_str()));

    let mut found: Vec<String> = Vec::new();
    for text in texts {
        for tag in HASHTAG.find_iter(text) {
            if !found.iter().any(|seen| seen == tag.as_str()) {
                found.push(tag.as_str().to_string());
            }
        }
    }
    found
}
