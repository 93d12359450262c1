//! Picks a displayable image for a post.
//!
//! Reddit reports thumbnails in several places and often uses placeholder
//! words (`self`, `default`, `nsfw`, `spoiler`) instead of a URL. Candidates
//! are tried in order: the `thumbnail` field, the linked image for image
//! posts, then the first preview source.

use crate::api::RedditPostData;
use url::Url;

pub fn resolve_thumbnail(post: &RedditPostData) -> Option<String> {
    let direct = post.thumbnail.as_deref().filter(|t| is_http_url(t));

    let linked_image = || {
        post.url_overridden_by_dest
            .as_deref()
            .filter(|_| post.post_hint.as_deref() == Some("image"))
            .filter(|u| is_http_url(u))
    };

    let preview = || {
        post.preview
            .as_ref()
            .and_then(|p| p.images.first())
            .and_then(|image| image.source.as_ref())
            .map(|source| source.url.as_str())
            .filter(|u| !u.is_empty())
    };

    direct
        .or_else(linked_image)
        .or_else(preview)
        .map(sanitize_image_url)
}

/// Undoes Reddit's HTML escaping of query strings and forces https.
pub fn sanitize_image_url(raw: &str) -> String {
    let unescaped = raw.replace("&amp;", "&");
    match unescaped.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => unescaped,
    }
}

fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}
