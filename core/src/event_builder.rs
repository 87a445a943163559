//! Pure construction of unsigned events for migrated content
//!
//! No I/O happens here. Builders are deterministic given identical inputs,
//! except that `created_at` defaults to now when the source did not record
//! an original timestamp.

use crate::types::item::{Article, PostKind, ProfileUpdate};
use crate::types::media::UploadedMedia;
use nostr_sdk::{Kind, Metadata, PublicKey, Tag, TagKind, Timestamp, UnsignedEvent, Url};

/// NIP-68 picture event.
pub const PICTURE_KIND: u16 = 20;
/// NIP-71 short vertical video event.
pub const SHORT_VIDEO_KIND: u16 = 22;
/// Blossom upload authorization event.
pub const UPLOAD_AUTH_KIND: u16 = 24242;

/// Build the event for a media post.
///
/// Image and carousel posts become picture events, video posts short-video
/// events. One `imeta` tag per media object, in source order. The original
/// post time is preserved when known.
pub fn post(
    author: PublicKey,
    media: &[UploadedMedia],
    caption: Option<&str>,
    kind: PostKind,
    posted_at: Option<u64>,
) -> UnsignedEvent {
    let event_kind = match kind {
        PostKind::Image | PostKind::Carousel => Kind::from(PICTURE_KIND),
        PostKind::Video => Kind::from(SHORT_VIDEO_KIND),
    };

    let tags: Vec<Tag> = media.iter().map(imeta_tag).collect();

    UnsignedEvent::new(
        author,
        timestamp_or_now(posted_at),
        event_kind,
        tags,
        caption.unwrap_or_default(),
    )
}

/// Build the long-form event for an article.
///
/// The `d` tag is derived from the source item id, so re-publishing the same
/// article replaces the previous event instead of duplicating it. The header
/// image, when present, must already be resolved to its migrated URL.
pub fn article(
    author: PublicKey,
    article: &Article,
    header_image: Option<&UploadedMedia>,
) -> UnsignedEvent {
    let mut tags: Vec<Tag> = vec![Tag::identifier(article.id.as_str())];

    if let Some(title) = &article.title {
        tags.push(Tag::custom(TagKind::custom("title"), [title.clone()]));
    }
    if let Some(summary) = &article.summary {
        tags.push(Tag::custom(TagKind::custom("summary"), [summary.clone()]));
    }
    if let Some(image) = header_image {
        tags.push(Tag::custom(TagKind::custom("image"), [image.url.clone()]));
    }
    if let Some(published_at) = article.published_at {
        tags.push(Tag::custom(
            TagKind::custom("published_at"),
            [published_at.to_string()],
        ));
    }
    for tag in &article.tags {
        tags.push(Tag::hashtag(tag.clone()));
    }

    UnsignedEvent::new(
        author,
        timestamp_or_now(article.published_at),
        Kind::LongFormTextNote,
        tags,
        article.body.clone(),
    )
}

/// Build the kind-0 metadata event for a profile update.
pub fn profile(author: PublicKey, update: &ProfileUpdate) -> UnsignedEvent {
    let mut metadata = Metadata::new().name(&update.name);
    if let Some(about) = &update.about {
        metadata = metadata.about(about);
    }
    if let Some(picture) = update.picture.as_deref().and_then(|p| Url::parse(p).ok()) {
        metadata = metadata.picture(picture);
    }

    UnsignedEvent::new(
        author,
        Timestamp::now(),
        Kind::Metadata,
        vec![],
        metadata.as_json(),
    )
}

/// Build a short-lived upload authorization binding the content hash and
/// byte size to the uploader's key.
pub fn upload_auth(
    author: PublicKey,
    content_hash: &str,
    size: u64,
    expires_at: Timestamp,
) -> UnsignedEvent {
    let tags = vec![
        Tag::custom(TagKind::custom("t"), ["upload"]),
        Tag::custom(TagKind::custom("x"), [content_hash]),
        Tag::custom(TagKind::custom("size"), [size.to_string()]),
        Tag::expiration(expires_at),
    ];

    UnsignedEvent::new(
        author,
        Timestamp::now(),
        Kind::from(UPLOAD_AUTH_KIND),
        tags,
        format!("Upload {content_hash}"),
    )
}

fn imeta_tag(media: &UploadedMedia) -> Tag {
    Tag::custom(
        TagKind::custom("imeta"),
        [
            format!("url {}", media.url),
            format!("m {}", media.mime_type),
            format!("x {}", media.content_hash),
        ],
    )
}

fn timestamp_or_now(original: Option<u64>) -> Timestamp {
    original.map(Timestamp::from).unwrap_or_else(Timestamp::now)
}
