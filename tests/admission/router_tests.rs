//! Router-level tests: every assertion here goes through the same
//! normalize/validate/authorize/encode path production traffic takes.

use axum::http::StatusCode;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use managed_webhooks::webhooks::{build_router, WebhookRegistry};

use crate::fixtures::{metadata_object, post, review_body, TEST_UID};

fn app() -> Router {
    let registry = WebhookRegistry::default_set().expect("default registry builds");
    build_router(&registry, None)
}

async fn send(
    uri: &str,
    content_type: &str,
    body: Vec<u8>,
) -> (StatusCode, serde_json::Value) {
    let response = app()
        .oneshot(post(uri, content_type, body))
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let review: serde_json::Value =
        serde_json::from_slice(&bytes).expect("response is a review envelope");
    (status, review)
}

fn namespace_review(ns: &str, username: &str, groups: &[&str]) -> Vec<u8> {
    review_body(
        "Namespace",
        username,
        groups,
        "CREATE",
        Some(metadata_object(ns, None)),
        None,
    )
}

#[tokio::test]
async fn test_kube_system_scenario() {
    // dedicated-admins cannot touch kube-system...
    let (status, review) = send(
        "/namespace-validation",
        "application/json",
        namespace_review("kube-system", "test-user", &["dedicated-admins"]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], serde_json::json!(false));
    assert_eq!(review["response"]["uid"], serde_json::json!(TEST_UID));

    // ...but SRE admins can
    let (status, review) = send(
        "/namespace-validation",
        "application/json",
        namespace_review("kube-system", "test-user", &["osd-sre-admins"]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], serde_json::json!(true));
    assert_eq!(review["response"]["uid"], serde_json::json!(TEST_UID));
}

#[tokio::test]
async fn test_deny_is_a_policy_outcome_not_an_error() {
    let (status, review) = send(
        "/regular-user-validation",
        "application/json",
        review_body(
            "ClusterVersion",
            "test-user",
            &["system:authenticated"],
            "UPDATE",
            None,
            None,
        ),
    )
    .await;
    // PolicyDenied still answers 200
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], serde_json::json!(false));
}

#[tokio::test]
async fn test_empty_body_is_a_bad_request() {
    let (status, review) = send("/namespace-validation", "application/json", Vec::new()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(review["response"]["allowed"], serde_json::json!(false));
}

#[tokio::test]
async fn test_wrong_content_type_is_a_bad_request() {
    let (status, _) = send(
        "/namespace-validation",
        "text/plain",
        namespace_review("my-ns", "test-user", &[]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_structural_error_still_echoes_uid() {
    // A Group review posted to the namespace endpoint fails structural
    // validation, but the uid must still come back.
    let (status, review) = send(
        "/namespace-validation",
        "application/json",
        review_body(
            "Group",
            "test-user",
            &[],
            "CREATE",
            Some(metadata_object("my-group", None)),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(review["response"]["allowed"], serde_json::json!(false));
    assert_eq!(review["response"]["uid"], serde_json::json!(TEST_UID));
}

#[tokio::test]
async fn test_unknown_route_is_not_served() {
    let response = app()
        .oneshot(post(
            "/no-such-validation",
            "application/json",
            namespace_review("my-ns", "test-user", &[]),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_validation_route() {
    let (status, review) = send(
        "/group-validation",
        "application/json",
        review_body(
            "Group",
            "test-user",
            &["system:authenticated"],
            "UPDATE",
            Some(metadata_object("dedicated-admins", None)),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], serde_json::json!(false));

    let (_, review) = send(
        "/group-validation",
        "application/json",
        review_body(
            "Group",
            "test-user",
            &["osd-sre-admins"],
            "UPDATE",
            Some(metadata_object("dedicated-admins", None)),
            None,
        ),
    )
    .await;
    assert_eq!(review["response"]["allowed"], serde_json::json!(true));
}

#[tokio::test]
async fn test_identity_validation_route() {
    let identity = serde_json::json!({
        "metadata": {"name": "sre-identity", "uid": TEST_UID},
        "providerName": "OpenShift_SRE"
    });
    let (status, review) = send(
        "/identity-validation",
        "application/json",
        review_body(
            "Identity",
            "test-user",
            &["system:authenticated"],
            "UPDATE",
            Some(identity),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], serde_json::json!(false));
}

#[tokio::test]
async fn test_subscription_validation_route() {
    let subscription = metadata_object("my-subscription", Some("openshift-marketplace"));
    let (status, review) = send(
        "/subscription-validation",
        "application/json",
        review_body(
            "Subscription",
            "dedi-admin",
            &["dedicated-admins", "system:authenticated"],
            "UPDATE",
            Some(subscription),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], serde_json::json!(true));

    let elsewhere = metadata_object("my-subscription", Some("my-ns"));
    let (_, review) = send(
        "/subscription-validation",
        "application/json",
        review_body(
            "Subscription",
            "dedi-admin",
            &["dedicated-admins", "system:authenticated"],
            "UPDATE",
            Some(elsewhere),
            None,
        ),
    )
    .await;
    assert_eq!(review["response"]["allowed"], serde_json::json!(false));
}

#[tokio::test]
async fn test_delete_namespace_uses_old_object() {
    let (status, review) = send(
        "/namespace-validation",
        "application/json",
        review_body(
            "Namespace",
            "test-user",
            &["dedicated-admins"],
            "DELETE",
            None,
            Some(metadata_object("openshift-config", None)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], serde_json::json!(false));
    assert_eq!(review["response"]["uid"], serde_json::json!(TEST_UID));
}
