use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use weekly_digest_core::config::EngineConfig;
use weekly_digest_core::embed::render_embed;
use weekly_digest_core::merge::{
    MergeError, MergeOutcome, SubmitRequest, ValidationError, WeeklyMergeEngine,
};
use weekly_digest_core::normalize::NormalizeError;
use weekly_digest_core::store::{
    Document, DocumentUpdate, MockDocumentStore, NewDocument, StoreError,
};

/// Wednesday of the week starting Monday 2024-01-01 (UTC).
fn first_week() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap()
}

fn engine(store: MockDocumentStore) -> WeeklyMergeEngine<MockDocumentStore> {
    WeeklyMergeEngine::new(store, EngineConfig::new(Tz::UTC))
}

fn existing_document(html: Option<&str>) -> Document {
    Document {
        id: "doc-1".to_string(),
        slug: "01012024".to_string(),
        status: Some("published".to_string()),
        html: html.map(str::to_string),
        updated_at: "2024-01-01T10:00:00.000Z".to_string(),
        url: Some("https://blog.example.com/01012024/".to_string()),
    }
}

/// A mock store that remembers the single document it holds.
fn stateful_store(state: Arc<Mutex<Option<Document>>>) -> MockDocumentStore {
    let mut store = MockDocumentStore::new();

    let lookup_state = state.clone();
    store
        .expect_get_document_by_slug()
        .returning(move |_slug: &str| Ok(lookup_state.lock().unwrap().clone()));

    let create_state = state.clone();
    store
        .expect_create_document()
        .returning(move |req: NewDocument| {
            let doc = Document {
                id: "doc-1".to_string(),
                slug: req.slug.clone(),
                status: Some(req.status),
                html: Some(req.html),
                updated_at: "2024-01-03T12:00:00.000Z".to_string(),
                url: Some(format!("https://blog.example.com/{}/", req.slug)),
            };
            *create_state.lock().unwrap() = Some(doc.clone());
            Ok(Some(doc))
        });

    let update_state = state;
    store
        .expect_update_document_body()
        .returning(move |req: DocumentUpdate| {
            let mut guard = update_state.lock().unwrap();
            let doc = guard.as_mut().expect("update before create");
            assert_eq!(doc.updated_at, req.updated_at, "stale updated_at sent");
            doc.html = Some(req.html);
            doc.status = Some(req.status);
            doc.updated_at = "2024-01-03T12:05:00.000Z".to_string();
            Ok(Some(doc.clone()))
        });

    store
}

#[tokio::test]
async fn creates_weekly_document_when_none_exists() {
    let mut store = MockDocumentStore::new();
    store
        .expect_get_document_by_slug()
        .withf(|slug: &str| slug == "01012024")
        .times(1)
        .returning(|_| Ok(None));
    store
        .expect_create_document()
        .withf(|req: &NewDocument| {
            req.title == "01012024"
                && req.slug == "01012024"
                && req.status == "published"
                && req.html == render_embed("https://x.com/someuser/status/42")
        })
        .times(1)
        .returning(|req| {
            Ok(Some(Document {
                id: "doc-1".to_string(),
                slug: req.slug,
                status: Some(req.status),
                html: Some(req.html),
                updated_at: "2024-01-03T12:00:00.000Z".to_string(),
                url: Some("https://blog.example.com/01012024/".to_string()),
            }))
        });
    store.expect_update_document_body().never();

    let outcome = engine(store)
        .submit("https://x.com/someuser/status/42", first_week(), Tz::UTC)
        .await
        .expect("submit should succeed");

    assert_eq!(
        outcome,
        MergeOutcome::Created {
            slug: "01012024".to_string(),
            document_id: "doc-1".to_string(),
            document_url: Some("https://blog.example.com/01012024/".to_string()),
        }
    );
}

#[tokio::test]
async fn same_url_twice_in_a_week_is_created_then_duplicate() {
    let state = Arc::new(Mutex::new(None));
    let engine = engine(stateful_store(state.clone()));
    let url = "https://x.com/someuser/status/42";

    let first = engine.submit(url, first_week(), Tz::UTC).await.unwrap();
    let body_after_first = state.lock().unwrap().clone().unwrap().html;
    let second = engine.submit(url, first_week(), Tz::UTC).await.unwrap();

    assert!(matches!(first, MergeOutcome::Created { .. }));
    assert!(second.is_duplicate());
    assert_eq!(first.document_id(), second.document_id());
    assert_eq!(second.slug(), "01012024");
    // Duplicate is a no-op: the body is untouched.
    assert_eq!(state.lock().unwrap().clone().unwrap().html, body_after_first);
}

#[tokio::test]
async fn different_post_in_same_week_is_appended() {
    let state = Arc::new(Mutex::new(None));
    let engine = engine(stateful_store(state.clone()));

    engine
        .submit("https://x.com/someuser/status/42", first_week(), Tz::UTC)
        .await
        .unwrap();
    let outcome = engine
        .submit("https://twitter.com/other/status/4242", first_week(), Tz::UTC)
        .await
        .unwrap();

    assert!(matches!(outcome, MergeOutcome::Appended { .. }));
    assert_eq!(outcome.document_id(), "doc-1");

    let html = state.lock().unwrap().clone().unwrap().html.unwrap();
    assert_eq!(
        html,
        format!(
            "{}\n\n{}",
            render_embed("https://x.com/someuser/status/42"),
            render_embed("https://x.com/other/status/4242")
        )
    );
}

#[tokio::test]
async fn same_post_from_another_mirror_is_duplicate() {
    let state = Arc::new(Mutex::new(None));
    let engine = engine(stateful_store(state));

    engine
        .submit("https://x.com/someuser/status/42", first_week(), Tz::UTC)
        .await
        .unwrap();
    let outcome = engine
        .submit(
            "https://mobile.twitter.com/SomeUser/status/42?s=20",
            first_week(),
            Tz::UTC,
        )
        .await
        .unwrap();

    assert!(outcome.is_duplicate());
}

#[tokio::test]
async fn append_trims_trailing_whitespace_and_keeps_status_and_token() {
    let existing = render_embed("https://x.com/a/status/1");
    let padded = format!("{existing}\n\n\n");
    let expected_html = format!("{existing}\n\n{}", render_embed("https://x.com/b/status/2"));

    let mut store = MockDocumentStore::new();
    let mut doc = existing_document(Some(&padded));
    doc.status = Some("draft".to_string());
    store
        .expect_get_document_by_slug()
        .return_once(move |_| Ok(Some(doc)));
    store
        .expect_update_document_body()
        .withf(move |req: &DocumentUpdate| {
            req.id == "doc-1"
                && req.updated_at == "2024-01-01T10:00:00.000Z"
                && req.status == "draft"
                && req.html == expected_html
        })
        .times(1)
        .returning(|req| {
            Ok(Some(Document {
                id: req.id,
                slug: "01012024".to_string(),
                status: Some(req.status),
                html: Some(req.html),
                updated_at: "2024-01-03T12:05:00.000Z".to_string(),
                url: None,
            }))
        });

    let outcome = engine(store)
        .submit("https://x.com/b/status/2", first_week(), Tz::UTC)
        .await
        .unwrap();

    // Falls back to the looked-up document's URL when the update omits it.
    assert_eq!(
        outcome,
        MergeOutcome::Appended {
            slug: "01012024".to_string(),
            document_id: "doc-1".to_string(),
            document_url: Some("https://blog.example.com/01012024/".to_string()),
        }
    );
}

#[tokio::test]
async fn existing_document_without_body_or_status_gets_embed_as_published() {
    let mut store = MockDocumentStore::new();
    let mut doc = existing_document(None);
    doc.status = None;
    store
        .expect_get_document_by_slug()
        .return_once(move |_| Ok(Some(doc)));
    store
        .expect_update_document_body()
        .withf(|req: &DocumentUpdate| {
            req.status == "published" && req.html == render_embed("https://x.com/b/status/2")
        })
        .times(1)
        .returning(|req| {
            Ok(Some(Document {
                id: req.id,
                slug: "01012024".to_string(),
                status: Some(req.status),
                html: Some(req.html),
                updated_at: "2024-01-03T12:05:00.000Z".to_string(),
                url: None,
            }))
        });

    let outcome = engine(store)
        .submit("https://x.com/b/status/2", first_week(), Tz::UTC)
        .await
        .unwrap();
    assert!(matches!(outcome, MergeOutcome::Appended { .. }));
}

#[tokio::test]
async fn numeric_prefix_in_body_is_not_a_duplicate() {
    let body = render_embed("https://x.com/a/status/1234");
    let mut store = MockDocumentStore::new();
    store
        .expect_get_document_by_slug()
        .return_once(move |_| Ok(Some(existing_document(Some(&body)))));
    store
        .expect_update_document_body()
        .times(1)
        .returning(|req| {
            Ok(Some(Document {
                id: req.id,
                slug: "01012024".to_string(),
                status: Some(req.status),
                html: Some(req.html),
                updated_at: "2024-01-03T12:05:00.000Z".to_string(),
                url: None,
            }))
        });

    let outcome = engine(store)
        .submit("https://x.com/a/status/123", first_week(), Tz::UTC)
        .await
        .unwrap();
    assert!(matches!(outcome, MergeOutcome::Appended { .. }));
}

#[tokio::test]
async fn invalid_input_never_reaches_the_store() {
    // No expectations: any store call panics.
    let engine = engine(MockDocumentStore::new());

    let err = engine
        .submit("https://example.com/someuser/status/42", first_week(), Tz::UTC)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MergeError::Validation(ValidationError::Url(NormalizeError::UnsupportedHost { .. }))
    ));
    assert_eq!(err.http_status(), 400);
    assert_eq!(err.to_string(), "Only x.com/twitter.com post URLs are supported.");

    let err = engine
        .submit("definitely not a url", first_week(), Tz::UTC)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MergeError::Validation(ValidationError::Url(NormalizeError::InvalidUrl))
    ));
}

#[tokio::test]
async fn lookup_failure_surfaces_as_store_error() {
    let mut store = MockDocumentStore::new();
    store.expect_get_document_by_slug().returning(|_| {
        Err(StoreError::Api {
            status: 500,
            message: "boom".to_string(),
        })
    });
    store.expect_create_document().never();

    let err = engine(store)
        .submit("https://x.com/someuser/status/42", first_week(), Tz::UTC)
        .await
        .unwrap_err();

    match &err {
        MergeError::Store(inner) => assert_eq!(inner.status(), Some(500)),
        other => panic!("expected store error, got {other:?}"),
    }
    assert_eq!(err.http_status(), 502);
}

#[tokio::test]
async fn stale_update_is_rejected_without_retry() {
    let mut store = MockDocumentStore::new();
    store
        .expect_get_document_by_slug()
        .times(1)
        .returning(|_| Ok(Some(existing_document(Some("older body status/1")))));
    store.expect_update_document_body().times(1).returning(|_| {
        Err(StoreError::Api {
            status: 409,
            message: "UpdateCollisionError".to_string(),
        })
    });

    let err = engine(store)
        .submit("https://x.com/someuser/status/42", first_week(), Tz::UTC)
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::Store(StoreError::Api { status: 409, .. })));
}

#[tokio::test]
async fn create_without_payload_is_a_contract_violation() {
    let mut store = MockDocumentStore::new();
    store.expect_get_document_by_slug().returning(|_| Ok(None));
    store.expect_create_document().times(1).returning(|_| Ok(None));

    let err = engine(store)
        .submit("https://x.com/someuser/status/42", first_week(), Tz::UTC)
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::ContractViolation(_)));
    assert_eq!(err.http_status(), 500);
}

#[tokio::test]
async fn update_without_payload_is_a_contract_violation() {
    let mut store = MockDocumentStore::new();
    store
        .expect_get_document_by_slug()
        .returning(|_| Ok(Some(existing_document(Some("status/1")))));
    store.expect_update_document_body().times(1).returning(|_| Ok(None));

    let err = engine(store)
        .submit("https://x.com/someuser/status/42", first_week(), Tz::UTC)
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::ContractViolation(_)));
}

#[tokio::test]
async fn submit_request_uses_override_then_default_time_zone() {
    // Sunday 2024-01-07 20:00 UTC is already Monday 2024-01-08 in Kolkata.
    let now = Utc.with_ymd_and_hms(2024, 1, 7, 20, 0, 0).unwrap();

    let mut store = MockDocumentStore::new();
    store
        .expect_get_document_by_slug()
        .withf(|slug: &str| slug == "08012024")
        .times(1)
        .returning(|_| Ok(Some(existing_document(Some("status/42")))));
    store
        .expect_get_document_by_slug()
        .withf(|slug: &str| slug == "01012024")
        .times(2)
        .returning(|_| Ok(Some(existing_document(Some("status/42")))));
    let engine = engine(store);

    let with_override = SubmitRequest {
        raw_url: "https://x.com/someuser/status/42".to_string(),
        time_zone_override: Some("Asia/Kolkata".to_string()),
    };
    let outcome = engine.submit_request(&with_override, now).await.unwrap();
    assert_eq!(outcome.slug(), "08012024");

    for time_zone_override in [None, Some("   ".to_string())] {
        let request = SubmitRequest {
            raw_url: "https://x.com/someuser/status/42".to_string(),
            time_zone_override,
        };
        let outcome = engine.submit_request(&request, now).await.unwrap();
        assert_eq!(outcome.slug(), "01012024");
    }
}

#[tokio::test]
async fn unknown_time_zone_override_is_a_validation_error() {
    let engine = engine(MockDocumentStore::new());
    let request = SubmitRequest {
        raw_url: "https://x.com/someuser/status/42".to_string(),
        time_zone_override: Some("Nowhere/Atlantis".to_string()),
    };

    let err = engine.submit_request(&request, first_week()).await.unwrap_err();
    assert!(matches!(
        err,
        MergeError::Validation(ValidationError::TimeZone(_))
    ));
    assert_eq!(err.http_status(), 400);
}

#[test]
fn outcome_serializes_with_tag() {
    let outcome = MergeOutcome::Duplicate {
        slug: "01012024".to_string(),
        document_id: "doc-1".to_string(),
        document_url: None,
    };
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "outcome": "duplicate",
            "slug": "01012024",
            "document_id": "doc-1",
            "document_url": null
        })
    );
}
