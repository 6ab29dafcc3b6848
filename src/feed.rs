//! Media feed pagination: the page fetcher and the pull-based cursor walk.

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

use crate::session::Session;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("account {0} appears to be private: first page returned no items")]
    Private(String),
    #[error("account {0} does not exist (feed returned {1})")]
    NotFound(String, reqwest::StatusCode),
    #[error("feed request failed")]
    Request(#[from] reqwest::Error),
}

impl FeedError {
    /// True for the two unavailability signals that terminate one account's
    /// walk but should not abort a batch.
    #[must_use]
    pub fn is_account_unavailable(&self) -> bool {
        matches!(self, Self::Private(_) | Self::NotFound(_, _))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resolution {
    pub url: String,
}

/// Fixed-resolution renditions of one media asset. The feed also carries
/// thumbnails and low-resolution variants; `standard_resolution` is the
/// largest fixed rendition and the only one used here.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionSet {
    pub standard_resolution: Resolution,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeCount {
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Caption {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Comments {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub data: Vec<Comment>,
}

/// One raw feed record. Immutable once fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Creation time in epoch seconds. The feed delivers it as a decimal
    /// string.
    #[serde(deserialize_with = "epoch_from_string")]
    pub created_time: i64,
    pub likes: LikeCount,
    /// `null` for items posted without a text caption; an expected case.
    #[serde(default)]
    pub caption: Option<Caption>,
    #[serde(default)]
    pub comments: Comments,
    #[serde(default)]
    pub images: Option<ResolutionSet>,
    #[serde(default)]
    pub videos: Option<ResolutionSet>,
}

/// One page of the feed. A missing `more_available` flag means the walk is
/// over.
#[derive(Debug, Deserialize)]
pub struct MediaPage {
    pub items: Vec<MediaItem>,
    #[serde(default)]
    pub more_available: bool,
}

fn epoch_from_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// Perform one feed request for `account`, continuing from `cursor` when
/// present. No retry at this layer; transient failures propagate.
///
/// # Errors
///
/// `FeedError::NotFound` for a non-success response, `FeedError::Request`
/// for transport or decode failures.
pub async fn fetch_page(
    session: &Session,
    account: &str,
    cursor: Option<&str>,
) -> Result<MediaPage, FeedError> {
    let mut url = format!("{}/{account}/media", session.base_url());
    if let Some(max_id) = cursor {
        url.push_str("?max_id=");
        url.push_str(max_id);
    }

    debug!(account, cursor = ?cursor, "Fetching media page");

    let response = session.client().get(&url).send().await?;
    if !response.status().is_success() {
        return Err(FeedError::NotFound(account.to_string(), response.status()));
    }

    Ok(response.json().await?)
}

/// Pull-based pagination cursor over one account's media feed.
///
/// Pages advance strictly by the id of the previous page's last item, so no
/// item is yielded twice. The walk is not restartable: a fresh `MediaFeed`
/// issues fresh network requests.
pub struct MediaFeed<'a> {
    session: &'a Session,
    account: String,
    cursor: Option<String>,
    fetched_first: bool,
    done: bool,
}

impl<'a> MediaFeed<'a> {
    #[must_use]
    pub fn new(session: &'a Session, account: &str) -> Self {
        Self {
            session,
            account: account.to_string(),
            cursor: None,
            fetched_first: false,
            done: false,
        }
    }

    /// Fetch the next batch of items, or `Ok(None)` once the page carrying
    /// `more_available == false` has been yielded. After that, no further
    /// network request is issued.
    ///
    /// # Errors
    ///
    /// `FeedError::Private` if the first page has no items,
    /// `FeedError::NotFound` for a non-success response. In both cases the
    /// session is logged out before the error is returned.
    pub async fn next_page(&mut self) -> Result<Option<Vec<MediaItem>>, FeedError> {
        if self.done {
            return Ok(None);
        }

        let page = match fetch_page(self.session, &self.account, self.cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                if e.is_account_unavailable() {
                    self.session.logout().await;
                }
                return Err(e);
            }
        };

        if !self.fetched_first && page.items.is_empty() {
            self.done = true;
            self.session.logout().await;
            return Err(FeedError::Private(self.account.clone()));
        }
        self.fetched_first = true;

        // A continuation flag with no items to take a cursor from would spin
        // on the same request forever; treat it as termination.
        match (page.more_available, page.items.last()) {
            (true, Some(last)) => self.cursor = Some(last.id.clone()),
            _ => self.done = true,
        }

        Ok(Some(page.items))
    }
}
