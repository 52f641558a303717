//! Weekly merge: files a post URL into the document for its week, exactly once.
//!
//! This module provides the orchestration behind every webhook delivery. For one submitted
//! URL it:
//!   - Normalizes the URL into a post identity ([`crate::normalize`])
//!   - Computes the week bucket for "now" in the requested zone ([`crate::week`])
//!   - Looks up the week's document in the [`DocumentStore`] by slug
//!   - Creates the document, appends to it, or recognizes the post as already present
//!
//! # Major Types
//! - [`WeeklyMergeEngine`]: holds the store and [`EngineConfig`]; stateless between calls
//! - [`MergeOutcome`]: what happened (`Created`, `Appended`, `Duplicate`)
//! - [`MergeError`]: validation, store and contract failures, kept apart so callers can
//!   map them to distinct responses
//!
//! # Responsibilities
//! - Idempotency by content inspection: a post already embedded in the week's body is a
//!   no-op, no write is issued
//! - Every call re-derives its state from the store; nothing is cached
//! - Updates carry the document's `updated_at`, so a concurrent writer makes the store
//!   reject ours. That rejection surfaces as [`MergeError::Store`] and is never retried.
//!
//! # Navigation
//! - Main entrypoint: [`WeeklyMergeEngine::submit`]
//! - Request-shaped entrypoint for the calling layer: [`WeeklyMergeEngine::submit_request`]

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::embed::{append_embed, contains_post, render_embed};
use crate::normalize::{normalize, NormalizeError};
use crate::store::{Document, DocumentStore, DocumentUpdate, NewDocument, StoreError, PUBLISHED};
use crate::week::{parse_time_zone, week_bucket, InvalidTimeZone};

/// Input accepted from the calling layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitRequest {
    pub raw_url: String,
    #[serde(default)]
    pub time_zone_override: Option<String>,
}

/// Result of merging one post into its week's document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// No document existed for the week; one was created holding this post.
    Created {
        slug: String,
        document_id: String,
        document_url: Option<String>,
    },
    /// The post was appended to the week's existing document.
    Appended {
        slug: String,
        document_id: String,
        document_url: Option<String>,
    },
    /// The post was already in the week's document; nothing was written.
    Duplicate {
        slug: String,
        document_id: String,
        document_url: Option<String>,
    },
}

impl MergeOutcome {
    pub fn slug(&self) -> &str {
        match self {
            MergeOutcome::Created { slug, .. }
            | MergeOutcome::Appended { slug, .. }
            | MergeOutcome::Duplicate { slug, .. } => slug,
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            MergeOutcome::Created { document_id, .. }
            | MergeOutcome::Appended { document_id, .. }
            | MergeOutcome::Duplicate { document_id, .. } => document_id,
        }
    }

    pub fn document_url(&self) -> Option<&str> {
        match self {
            MergeOutcome::Created { document_url, .. }
            | MergeOutcome::Appended { document_url, .. }
            | MergeOutcome::Duplicate { document_url, .. } => document_url.as_deref(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, MergeOutcome::Duplicate { .. })
    }
}

/// Client-input failures. Never retryable, shown to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Url(#[from] NormalizeError),
    #[error(transparent)]
    TimeZone(#[from] InvalidTimeZone),
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The store reported success but returned no usable payload.
    #[error("Store contract violation: {0}")]
    ContractViolation(String),
}

impl MergeError {
    /// HTTP status the calling layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            MergeError::Validation(_) => 400,
            MergeError::Store(_) => 502,
            MergeError::ContractViolation(_) => 500,
        }
    }
}

impl From<NormalizeError> for MergeError {
    fn from(e: NormalizeError) -> Self {
        MergeError::Validation(e.into())
    }
}

impl From<InvalidTimeZone> for MergeError {
    fn from(e: InvalidTimeZone) -> Self {
        MergeError::Validation(e.into())
    }
}

/// Merges submitted post URLs into weekly documents held by `S`.
pub struct WeeklyMergeEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S> WeeklyMergeEngine<S>
where
    S: DocumentStore,
{
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve the request's zone (override, else the configured default) and submit.
    pub async fn submit_request(
        &self,
        request: &SubmitRequest,
        now: DateTime<Utc>,
    ) -> Result<MergeOutcome, MergeError> {
        let tz = match request
            .time_zone_override
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            Some(name) => parse_time_zone(name)?,
            None => self.config.default_time_zone,
        };
        self.submit(&request.raw_url, now, tz).await
    }

    /// File `raw_url` into the document of the week containing `now` in `tz`.
    pub async fn submit(
        &self,
        raw_url: &str,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<MergeOutcome, MergeError> {
        let identity = normalize(raw_url)?;
        let bucket = week_bucket(now, tz);
        info!(
            post_id = %identity.post_id,
            slug = %bucket.slug,
            time_zone = %tz,
            "[MERGE] Resolved post and week"
        );

        let existing = self.store.get_document_by_slug(&bucket.slug).await.map_err(|e| {
            error!(error = %e, slug = %bucket.slug, "[MERGE][ERROR] Document lookup failed");
            e
        })?;

        let embed = render_embed(&identity.canonical_url);

        let Some(document) = existing else {
            let req = NewDocument {
                title: bucket.title.clone(),
                slug: bucket.slug.clone(),
                html: embed,
                status: PUBLISHED.to_string(),
            };
            let created = self.store.create_document(req).await.map_err(|e| {
                error!(error = %e, slug = %bucket.slug, "[MERGE][ERROR] create_document failed");
                e
            })?;
            let created = created.ok_or_else(|| {
                error!(slug = %bucket.slug, "[MERGE][ERROR] Store returned no created document");
                MergeError::ContractViolation(
                    "store did not return the created document".to_string(),
                )
            })?;
            info!(
                slug = %bucket.slug,
                document_id = %created.id,
                post_id = %identity.post_id,
                "[MERGE] Created weekly document"
            );
            return Ok(MergeOutcome::Created {
                slug: bucket.slug,
                document_id: created.id,
                document_url: created.url,
            });
        };

        if contains_post(document.html.as_deref(), &identity.post_id) {
            info!(
                slug = %bucket.slug,
                document_id = %document.id,
                post_id = %identity.post_id,
                "[MERGE] Post already present, skipping write"
            );
            return Ok(MergeOutcome::Duplicate {
                slug: bucket.slug,
                document_id: document.id,
                document_url: document.url,
            });
        }

        let updated = self.append(&document, &embed).await?;
        info!(
            slug = %bucket.slug,
            document_id = %updated.id,
            post_id = %identity.post_id,
            "[MERGE] Appended post to weekly document"
        );
        Ok(MergeOutcome::Appended {
            slug: bucket.slug,
            document_id: updated.id,
            document_url: updated.url.or(document.url),
        })
    }

    async fn append(&self, document: &Document, embed: &str) -> Result<Document, MergeError> {
        let html = append_embed(document.html.as_deref().unwrap_or(""), embed);
        debug!(document_id = %document.id, body_len = html.len(), "[MERGE] Prepared appended body");

        let req = DocumentUpdate {
            id: document.id.clone(),
            updated_at: document.updated_at.clone(),
            html,
            status: document
                .status
                .clone()
                .unwrap_or_else(|| PUBLISHED.to_string()),
        };
        let updated = self.store.update_document_body(req).await.map_err(|e| {
            error!(error = %e, document_id = %document.id, "[MERGE][ERROR] update_document_body failed");
            e
        })?;
        updated.ok_or_else(|| {
            error!(document_id = %document.id, "[MERGE][ERROR] Store returned no updated document");
            MergeError::ContractViolation("store did not return the updated document".to_string())
        })
    }
}
