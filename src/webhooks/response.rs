//! Admission response construction and encoding.
//!
//! The request uid is copied into every response before any early
//! return so the caller can always correlate a reply, including on
//! structural-error paths.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::DynamicObject;
use tracing::error;

/// Emitted when the response envelope itself cannot be encoded, so the
/// connection is never left without a reply.
const INTERNAL_ERROR_REVIEW: &str = r#"{"apiVersion":"admission.k8s.io/v1","kind":"AdmissionReview","response":{"uid":"","allowed":false,"status":{"message":"failed to encode admission response","code":500}}}"#;

/// An allow decision with a human-readable reason.
pub fn allowed(req: &AdmissionRequest<DynamicObject>, reason: &str) -> AdmissionResponse {
    let mut resp = AdmissionResponse::from(req);
    if !reason.is_empty() {
        resp.result.message = reason.to_string();
    }
    resp
}

/// A deny decision. This is a legitimate policy outcome, not an error.
pub fn denied(req: &AdmissionRequest<DynamicObject>, reason: &str) -> AdmissionResponse {
    AdmissionResponse::from(req).deny(reason)
}

/// A structural-error response: the request was malformed or could not
/// be decoded for this module. Distinct from a policy deny.
pub fn errored(uid: &str, message: &str) -> AdmissionResponse {
    let mut resp = AdmissionResponse::invalid(message);
    resp.uid = uid.to_string();
    resp.result.code = 400;
    resp
}

/// HTTP status for a decision: structural errors surface as 400, policy
/// outcomes (allow and deny alike) as 200.
pub fn http_status_for(resp: &AdmissionResponse) -> StatusCode {
    if !resp.allowed && resp.result.code == 400 {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    }
}

/// Wrap a decision into the review envelope and encode it. If encoding
/// fails, fall back to a canned internal-error review.
pub fn review_response(status: StatusCode, resp: AdmissionResponse) -> Response {
    let review = resp.into_review();
    match serde_json::to_vec(&review) {
        Ok(body) => http_response(status, body),
        Err(e) => {
            error!(error = %e, "Failed to encode admission review");
            http_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_REVIEW.as_bytes().to_vec(),
            )
        }
    }
}

fn http_response(status: StatusCode, body: Vec<u8>) -> Response {
    match Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
    {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP response");
            Response::new(Body::from(INTERNAL_ERROR_REVIEW))
        }
    }
}
