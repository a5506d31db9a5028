//! Shared fixtures for admission tests.

use axum::body::Body;
use axum::http::{header, Request};

pub const TEST_UID: &str = "9f8e7d6c-0000-4000-8000-123456789abc";

/// A full AdmissionReview request body, shaped like what the API server
/// posts to a validating webhook.
pub fn review_body(
    kind: &str,
    username: &str,
    groups: &[&str],
    operation: &str,
    object: Option<serde_json::Value>,
    old_object: Option<serde_json::Value>,
) -> Vec<u8> {
    let body = serde_json::json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": TEST_UID,
            "kind": {"group": "", "version": "v1", "kind": kind},
            "resource": {"group": "", "version": "v1", "resource": "unused"},
            "operation": operation,
            "userInfo": {"username": username, "groups": groups},
            "object": object,
            "oldObject": old_object
        }
    });
    serde_json::to_vec(&body).expect("fixture serializes")
}

/// An object payload carrying only the metadata the policies read.
pub fn metadata_object(name: &str, namespace: Option<&str>) -> serde_json::Value {
    let mut metadata = serde_json::json!({"name": name, "uid": TEST_UID});
    if let Some(ns) = namespace {
        metadata["namespace"] = serde_json::json!(ns);
    }
    serde_json::json!({"metadata": metadata})
}

/// POST a body to a webhook URI with the given content type.
pub fn post(uri: &str, content_type: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .expect("request builds")
}
