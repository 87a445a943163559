// ABOUTME: Content items produced by the ingestion pipeline: posts, articles, profile updates
// ABOUTME: Read-only to the orchestrator apart from the derived task status

use crate::types::media::MediaRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a content item in the source system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What kind of media a post carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Image,
    Video,
    Carousel,
}

/// A media post: one or more media references with an optional caption.
///
/// The media list is ordered; the order is preserved in the published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: ItemId,
    pub kind: PostKind,
    pub media: Vec<MediaRef>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Original publish time in the source system (unix seconds).
    /// Preserved on the migrated event so post dates survive the move.
    #[serde(default)]
    pub posted_at: Option<u64>,
}

/// A long-form article with a markdown body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: ItemId,
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub header_image: Option<MediaRef>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published_at: Option<u64>,
}

/// One unit of content to migrate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    Post(Post),
    Article(Article),
}

impl Item {
    pub fn id(&self) -> &ItemId {
        match self {
            Item::Post(post) => &post.id,
            Item::Article(article) => &article.id,
        }
    }

    /// Media references this item needs resolved, in publish order.
    pub fn media_refs(&self) -> Vec<&MediaRef> {
        match self {
            Item::Post(post) => post.media.iter().collect(),
            Item::Article(article) => article.header_image.iter().collect(),
        }
    }
}

/// Payload for the one-shot profile publish that runs ahead of the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}
