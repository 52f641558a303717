#![doc = "Ghost Admin API client: implements the core DocumentStore contract against a Ghost blog."]
//
//! # Ghost Document Store
//!
//! This module bridges the merge engine's [`DocumentStore`] abstraction to a real Ghost
//! site. Weekly documents are Ghost posts; their slug is the week bucket slug.
//!
//! - Construct [`GhostClient`] from the Admin API base URL and an [`AdminKey`].
//! - Every request mints a fresh short-lived admin JWT; the key never leaves this module.
//! - Transport, serialization and status mapping are encapsulated here. The engine only
//!   sees `Option<Document>` and [`StoreError`].
//!
//! No retries happen here. A stale `updated_at` comes back from Ghost as a 409 and is
//! surfaced unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use url::Url;

use weekly_digest_core::store::{
    Document, DocumentStore, DocumentUpdate, NewDocument, StoreError,
};

const ACCEPT_VERSION: &str = "v5.0";
const TOKEN_AUDIENCE: &str = "/admin/";
const TOKEN_TTL_SECS: i64 = 5 * 60;
/// Upper bound on how much of an error body ends up in logs.
const LOGGED_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum AdminKeyError {
    #[error("Invalid GHOST_ADMIN_API_KEY format. Expected <id>:<secret>.")]
    Format,
    #[error("Invalid GHOST_ADMIN_API_KEY secret: {0}")]
    Secret(#[from] hex::FromHexError),
}

/// A Ghost Admin API key (`<id>:<hex secret>`).
#[derive(Clone)]
pub struct AdminKey {
    id: String,
    secret: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub iat: i64,
    pub exp: i64,
    pub aud: String,
}

impl AdminKey {
    pub fn parse(raw: &str) -> Result<Self, AdminKeyError> {
        let mut parts = raw.trim().split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(secret), None) if !id.is_empty() && !secret.is_empty() => {
                Ok(Self {
                    id: id.to_string(),
                    secret: hex::decode(secret)?,
                })
            }
            _ => Err(AdminKeyError::Format),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Mint an HS256 admin token valid for five minutes from `now`.
    pub fn mint_token(&self, now: DateTime<Utc>) -> Result<String, jsonwebtoken::errors::Error> {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.id.clone());
        let iat = now.timestamp();
        let claims = AdminClaims {
            iat,
            exp: iat + TOKEN_TTL_SECS,
            aud: TOKEN_AUDIENCE.to_string(),
        };
        encode(&header, &claims, &EncodingKey::from_secret(&self.secret))
    }
}

impl std::fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Ghost wraps every resource in a `posts` array.
#[derive(Debug, Default, Deserialize)]
struct PostsEnvelope {
    #[serde(default)]
    posts: Vec<Document>,
}

impl PostsEnvelope {
    fn into_first(self) -> Option<Document> {
        self.posts.into_iter().next()
    }
}

pub struct GhostClient {
    base_url: Url,
    admin_key: AdminKey,
    http: reqwest::Client,
}

impl GhostClient {
    /// `base_url` is the Admin API root, e.g. `https://blog.example.com/ghost/api/admin`.
    pub fn new(base_url: Url, admin_key: AdminKey) -> Self {
        tracing::info!(
            base_url = %base_url,
            key_id = admin_key.id(),
            "Initialized GhostClient"
        );
        Self {
            base_url,
            admin_key,
            http: reqwest::Client::new(),
        }
    }

    /// Build `{base}/{segments..}/` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Network(format!("cannot use {} as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<PostsEnvelope, StoreError> {
        let token = self.admin_key.mint_token(Utc::now()).map_err(|e| {
            tracing::error!(error = ?e, "Failed to mint Ghost admin token");
            StoreError::Auth(e.to_string())
        })?;

        tracing::debug!(%method, url = %url, "Sending Ghost Admin API request");
        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .query(query)
            .header(AUTHORIZATION, format!("Ghost {token}"))
            .header("Accept-Version", ACCEPT_VERSION)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = ?e, %method, url = %url, "Ghost request failed to send");
            StoreError::Network(e.to_string())
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                %method,
                url = %url,
                body = %truncate(&text, LOGGED_BODY_LIMIT),
                "Ghost API request failed"
            );
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(PostsEnvelope::default());
        }
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(error = ?e, url = %url, "Failed to parse Ghost API response");
            StoreError::Parse(e.to_string())
        })
    }
}

#[async_trait]
impl DocumentStore for GhostClient {
    async fn get_document_by_slug(&self, slug: &str) -> Result<Option<Document>, StoreError> {
        tracing::info!(slug, "Fetching Ghost post by slug");
        let url = self.endpoint(&["posts", "slug", slug])?;
        match self
            .request(Method::GET, url, &[("formats", "html")], None)
            .await
        {
            Ok(envelope) => Ok(envelope.into_first()),
            Err(e) if e.is_not_found() => {
                tracing::info!(slug, "No Ghost post for slug");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_document(&self, req: NewDocument) -> Result<Option<Document>, StoreError> {
        tracing::info!(slug = %req.slug, title = %req.title, "Creating Ghost post");
        let url = self.endpoint(&["posts"])?;
        let body = json!({
            "posts": [{
                "title": req.title,
                "slug": req.slug,
                "status": req.status,
                "html": req.html,
            }]
        });
        let created = self
            .request(Method::POST, url, &[("source", "html")], Some(body))
            .await?
            .into_first();
        if let Some(post) = &created {
            tracing::info!(post_id = %post.id, "Successfully created Ghost post");
        }
        Ok(created)
    }

    async fn update_document_body(
        &self,
        req: DocumentUpdate,
    ) -> Result<Option<Document>, StoreError> {
        tracing::info!(post_id = %req.id, updated_at = %req.updated_at, "Updating Ghost post body");
        let url = self.endpoint(&["posts", &req.id])?;
        let body = json!({
            "posts": [{
                "updated_at": req.updated_at,
                "html": req.html,
                "status": req.status,
            }]
        });
        let updated = self
            .request(Method::PUT, url, &[("source", "html")], Some(body))
            .await?
            .into_first();
        if let Some(post) = &updated {
            tracing::info!(post_id = %post.id, updated_at = %post.updated_at, "Successfully updated Ghost post");
        }
        Ok(updated)
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
