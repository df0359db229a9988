//! Integration tests for product upload, listing and deletion.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures::StreamExt;
use reqwest::{Response, StatusCode};

use shopfloor_admin::backend::{BackendError, FieldValue, StoreCall};
use shopfloor_admin::ingest::DATA_URI_PREFIX;
use shopfloor_core::{PRODUCTS_COLLECTION, field_names};
use shopfloor_integration_tests::{ImagePart, TestApp, location};

async fn signed_in_app() -> TestApp {
    let app = TestApp::spawn().await;
    app.login().await;
    app
}

async fn upload_ok(app: &TestApp, name: &str, price: &str) {
    let resp = app
        .upload(name, price, "Sneakers", Some(ImagePart::jpeg(64, 48)))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER, "upload of {name} failed");
    assert_eq!(location(&resp), "/");
}

fn product_ids(app: &TestApp) -> Vec<String> {
    app.backend
        .documents(PRODUCTS_COLLECTION)
        .into_iter()
        .map(|doc| doc.id.to_string())
        .collect()
}

/// Read server-sent events until one complete `data` payload arrives.
async fn next_event<S, B>(events: &mut S, buffer: &mut String) -> String
where
    S: futures::Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    loop {
        if let Some(end) = buffer.find("\n\n") {
            let raw: String = buffer.drain(..end + 2).collect();
            let data: Vec<&str> = raw
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|line| line.strip_prefix(' ').unwrap_or(line))
                .collect();
            if data.is_empty() {
                // keep-alive comment
                continue;
            }
            return data.join("\n");
        }
        let chunk = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("event arrives in time")
            .expect("stream still open")
            .unwrap();
        buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));
    }
}

async fn body(resp: Response) -> String {
    resp.text().await.unwrap()
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_large_jpeg_is_downscaled_and_stored() {
    let app = signed_in_app().await;

    let resp = app
        .upload("Air Runner", "12500", "Sneakers", Some(ImagePart::jpeg(2000, 1000)))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    let docs = app.backend.documents(PRODUCTS_COLLECTION);
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.get(field_names::NAME), Some(&FieldValue::String("Air Runner".to_string())));
    assert_eq!(doc.get(field_names::PRICE), Some(&FieldValue::Double(12500.0)));
    let image = doc.get(field_names::IMAGE).and_then(FieldValue::as_str).unwrap();
    assert!(image.starts_with(DATA_URI_PREFIX));
    assert!(image.len() <= 1_000_000);
    assert!(matches!(doc.get(field_names::CREATED_AT), Some(FieldValue::Timestamp(_))));

    let page = body(app.get("/").await).await;
    assert!(page.contains("Product uploaded successfully!"));
    assert!(page.contains("Air Runner"));
    assert!(page.contains("₦12,500"));
}

#[tokio::test]
async fn test_oversized_source_is_stored_with_advisory() {
    let app = signed_in_app().await;
    // 1200 x 400 x 3 bytes is well past the 1 MiB advisory limit.
    let part = ImagePart::bmp(1200, 400);
    assert!(part.bytes.len() > 1024 * 1024);

    let resp = app.upload("Studio Mule", "30000", "Sandals", Some(part)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    let docs = app.backend.documents(PRODUCTS_COLLECTION);
    assert_eq!(docs.len(), 1);
    let image = docs[0].get(field_names::IMAGE).and_then(FieldValue::as_str).unwrap();
    assert!(image.starts_with(DATA_URI_PREFIX));

    let page = body(app.get("/").await).await;
    assert!(page.contains("Product uploaded successfully!"));
    assert!(page.contains("Image size should be less than 1MB for best performance"));

    // The advisory is shown once.
    let page = body(app.get("/").await).await;
    assert!(!page.contains("Image size should be less than 1MB"));
}

#[tokio::test]
async fn test_created_at_strictly_increases() {
    let app = signed_in_app().await;

    for (name, price) in [("One", "100"), ("Two", "200"), ("Three", "300")] {
        upload_ok(&app, name, price).await;
    }

    let stamps: Vec<_> = app
        .backend
        .documents(PRODUCTS_COLLECTION)
        .iter()
        .map(|doc| match doc.get(field_names::CREATED_AT) {
            Some(FieldValue::Timestamp(at)) => *at,
            other => panic!("unexpected createdAt: {other:?}"),
        })
        .collect();
    assert_eq!(stamps.len(), 3);
    assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_dashboard_lists_newest_first() {
    let app = signed_in_app().await;
    upload_ok(&app, "Older Slide", "900").await;
    upload_ok(&app, "Newer Boot", "45000").await;

    let list = body(app.get("/products/list").await).await;

    let newer = list.find("Newer Boot").unwrap();
    let older = list.find("Older Slide").unwrap();
    assert!(newer < older);
    assert!(list.contains("₦45,000"));
}

#[tokio::test]
async fn test_invalid_price_is_rejected_locally() {
    let app = signed_in_app().await;

    let resp = app
        .upload("Air Runner", "abc", "Sneakers", Some(ImagePart::jpeg(64, 48)))
        .await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = body(resp).await;
    assert!(page.contains("Please enter a valid price"));
    // Typed values survive the failed attempt.
    assert!(page.contains("value=\"Air Runner\""));
    assert_eq!(app.backend.create_calls(), 0);
}

#[tokio::test]
async fn test_missing_image_is_rejected_locally() {
    let app = signed_in_app().await;

    let resp = app.upload("Air Runner", "12500", "Sneakers", None).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body(resp).await.contains("Please fill all fields"));
    assert_eq!(app.backend.create_calls(), 0);
}

#[tokio::test]
async fn test_non_image_file_is_rejected() {
    let app = signed_in_app().await;
    let notes = ImagePart {
        file_name: "notes.txt",
        media_type: "text/plain",
        bytes: b"not a picture".to_vec(),
    };

    let resp = app.upload("Air Runner", "12500", "Sneakers", Some(notes)).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body(resp).await.contains("Please upload a valid image file"));
    assert_eq!(app.backend.create_calls(), 0);
}

#[tokio::test]
async fn test_undecodable_image_reports_load_failure() {
    let app = signed_in_app().await;
    let broken = ImagePart {
        file_name: "broken.jpg",
        media_type: "image/jpeg",
        bytes: b"definitely not a jpeg".to_vec(),
    };

    let resp = app.upload("Air Runner", "12500", "Sneakers", Some(broken)).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body(resp).await.contains("Error uploading product: Failed to load image"));
    assert_eq!(app.backend.create_calls(), 0);
}

#[tokio::test]
async fn test_permission_denied_is_reported() {
    let app = signed_in_app().await;
    app.backend.fail_next_create(BackendError::permission_denied());

    let resp = app
        .upload("Air Runner", "12500", "Sneakers", Some(ImagePart::jpeg(64, 48)))
        .await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(body(resp).await.contains(
        "Error uploading product: Permission denied. Make sure you are logged in as admin."
    ));
    assert_eq!(app.backend.create_calls(), 1);
    assert!(app.backend.documents(PRODUCTS_COLLECTION).is_empty());
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_confirmation_names_the_product() {
    let app = signed_in_app().await;
    upload_ok(&app, "Air Runner", "12500").await;
    let id = product_ids(&app).remove(0);

    let resp = app.get(&format!("/products/{id}/delete")).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body(resp).await.contains("Are you sure you want to delete \"Air Runner\"?"));
}

#[tokio::test]
async fn test_delete_confirmation_for_unknown_product() {
    let app = signed_in_app().await;

    let resp = app.get("/products/missing/delete").await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_removes_exactly_one_product_and_updates_stream() {
    let app = signed_in_app().await;
    upload_ok(&app, "Keep Me", "100").await;
    upload_ok(&app, "Delete Me", "200").await;
    let docs = app.backend.documents(PRODUCTS_COLLECTION);
    let doomed = docs
        .iter()
        .find(|doc| doc.get(field_names::NAME).and_then(FieldValue::as_str) == Some("Delete Me"))
        .unwrap()
        .id
        .clone();

    let stream = app.get("/products/stream").await;
    assert_eq!(stream.status(), StatusCode::OK);
    let mut events = Box::pin(stream.bytes_stream());
    let mut buffer = String::new();

    let first = next_event(&mut events, &mut buffer).await;
    assert!(first.contains("Keep Me"));
    assert!(first.contains("Delete Me"));

    let resp = app.post(&format!("/products/{doomed}/delete")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let second = next_event(&mut events, &mut buffer).await;
    assert!(second.contains("Keep Me"));
    assert!(!second.contains("Delete Me"));

    let remaining = app.backend.documents(PRODUCTS_COLLECTION);
    assert_eq!(remaining.len(), 1);
    assert_ne!(remaining[0].id, doomed);
    assert!(app.backend.calls().iter().any(|call| matches!(
        call,
        StoreCall::Delete { id, .. } if *id == doomed
    )));

    let page = body(app.get("/").await).await;
    assert!(page.contains("Product deleted successfully!"));
}

#[tokio::test]
async fn test_delete_failure_is_flashed() {
    let app = signed_in_app().await;
    upload_ok(&app, "Air Runner", "12500").await;
    let id = product_ids(&app).remove(0);
    app.backend
        .fail_next_delete(BackendError::unavailable("connection reset"));

    let resp = app.post(&format!("/products/{id}/delete")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let page = body(app.get("/").await).await;
    assert!(page.contains("Error deleting product. Please try again."));
    assert_eq!(app.backend.documents(PRODUCTS_COLLECTION).len(), 1);
}
