//! Post URL normalization.
//!
//! Any allow-listed mirror URL of a post (`x.com`, `twitter.com`, mobile and `www`
//! variants) is reduced to a [`CanonicalIdentity`]: the numeric post id plus a canonical
//! URL on a single fixed host. Duplicate detection downstream keys on the post id only,
//! so two spellings of the author segment still collapse onto the same post.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Host every canonical URL is emitted on, whichever mirror the input used.
pub const CANONICAL_HOST: &str = "x.com";

const ALLOWED_HOSTS: [&str; 5] = [
    "x.com",
    "www.x.com",
    "twitter.com",
    "www.twitter.com",
    "mobile.twitter.com",
];

/// Path prefixes owned by the platform that can sit where an author handle would.
const RESERVED_AUTHOR_SEGMENTS: [&str; 6] = ["i", "home", "explore", "search", "intent", "share"];

/// Bytes left unescaped in an author segment: ASCII alphanumerics and `- _ . ! ~ * ' ( )`.
const AUTHOR_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Stable identity of a single post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalIdentity {
    pub canonical_url: String,
    pub post_id: String,
}

/// Reasons a submitted URL cannot be turned into a post identity.
/// The messages are shown to webhook callers verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Invalid URL.")]
    InvalidUrl,
    #[error("Only x.com/twitter.com post URLs are supported.")]
    UnsupportedHost { host: String },
    #[error("URL is not a valid X post URL.")]
    NotAPostUrl,
}

/// Canonicalize `input` into a [`CanonicalIdentity`].
///
/// Pure: the same input always yields the same identity.
pub fn normalize(input: &str) -> Result<CanonicalIdentity, NormalizeError> {
    let parsed = Url::parse(input.trim()).map_err(|_| NormalizeError::InvalidUrl)?;

    let host = parsed
        .host_str()
        .map(|h| h.trim().to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_HOSTS.contains(&host.as_str()) {
        return Err(NormalizeError::UnsupportedHost { host });
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let status_index = segments
        .iter()
        .position(|s| s.eq_ignore_ascii_case("status"))
        .ok_or(NormalizeError::NotAPostUrl)?;

    let post_id = segments
        .get(status_index + 1)
        .copied()
        .filter(|s| is_numeric(s))
        .ok_or(NormalizeError::NotAPostUrl)?;

    // Only `/{author}/status/{id}` carries a trustworthy author.
    let author = if status_index == 1 {
        segments.first().copied().filter(|s| !is_reserved_author(s))
    } else {
        None
    };

    let canonical_url = match author {
        Some(author) => format!(
            "https://{CANONICAL_HOST}/{}/status/{post_id}",
            encode_author(author)
        ),
        None => format!("https://{CANONICAL_HOST}/i/web/status/{post_id}"),
    };

    Ok(CanonicalIdentity {
        canonical_url,
        post_id: post_id.to_string(),
    })
}

/// Escape an author segment as a URI component.
///
/// The segment is taken as it appears in the serialized path, so an existing escape
/// such as `%20` is escaped again (`%2520`).
fn encode_author(segment: &str) -> String {
    utf8_percent_encode(segment, AUTHOR_SEGMENT).to_string()
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_reserved_author(segment: &str) -> bool {
    RESERVED_AUTHOR_SEGMENTS
        .iter()
        .any(|reserved| segment.eq_ignore_ascii_case(reserved))
}
