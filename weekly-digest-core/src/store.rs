//! # store: the document store contract consumed by the merge engine
//!
//! This module defines a single trait ([`DocumentStore`]) and the plain data types that
//! cross it. The engine only ever needs three calls against the remote content API:
//! look a document up by slug, create one, and replace one's body.
//!
//! ## Interface & Extensibility
//! - Implement [`DocumentStore`] for a new backend (the Ghost Admin API client lives in
//!   the `weekly-digest` crate).
//! - "Not found" on lookup is `Ok(None)`. Every other failure is a [`StoreError`].
//! - A write that succeeds without returning the written document is `Ok(None)`; the
//!   engine decides what that means.
//! - Transport, authentication and any retry policy belong to the implementor.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so tests get a `MockDocumentStore` (exported
//!   under the `test-export-mocks` feature for use from other crates).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Status given to newly created weekly documents.
pub const PUBLISHED: &str = "published";

/// A document as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Rendered body. Treated as opaque append-only text.
    #[serde(default)]
    pub html: Option<String>,
    /// Optimistic-concurrency token; must be echoed back on update.
    pub updated_at: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Minimal data needed to create a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub slug: String,
    pub html: String,
    pub status: String,
}

/// Full-body replacement of an existing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpdate {
    pub id: String,
    /// The `updated_at` read before modifying; a stale value is rejected upstream.
    pub updated_at: String,
    pub html: String,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl StoreError {
    /// Upstream HTTP status, when the store answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Read/create/update access to the documents the merge engine maintains.
///
/// The trait is `Send + Sync` and intended for async usage; the engine awaits exactly
/// one of these calls at a time.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the document with the given slug, or `None` when it does not exist.
    async fn get_document_by_slug(&self, slug: &str) -> Result<Option<Document>, StoreError>;

    /// Create a document. `None` means the store accepted it but returned no payload.
    async fn create_document(&self, req: NewDocument) -> Result<Option<Document>, StoreError>;

    /// Replace a document's body. `None` means the store accepted it but returned no payload.
    async fn update_document_body(
        &self,
        req: DocumentUpdate,
    ) -> Result<Option<Document>, StoreError>;
}
