//! Admission request normalization.
//!
//! Decodes a raw HTTP body into a typed [`AdmissionRequest`] after
//! checking content type and non-emptiness. Pure decode; no side effects.

use axum::http::{header, HeaderMap};
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use kube::core::DynamicObject;
use thiserror::Error;

/// The only content type accepted on webhook endpoints.
pub const VALID_CONTENT_TYPE: &str = "application/json";

/// Client-data faults detected while normalizing a request. All of them
/// map to an HTTP 400 and are never retried.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("request body is empty")]
    EmptyBody,

    #[error("contentType={0}, expected {VALID_CONTENT_TYPE}")]
    InvalidContentType(String),

    #[error("could not decode AdmissionReview: {0}")]
    InvalidReview(#[from] serde_json::Error),

    #[error("AdmissionReview contains no request: {0}")]
    MissingRequest(#[from] kube::core::admission::ConvertAdmissionReviewError),
}

/// Parse an admission review request out of a raw body.
///
/// The uid for response correlation is carried inside the returned
/// request; callers stamp it into every response they produce.
pub fn parse_admission_request(
    headers: &HeaderMap,
    body: &[u8],
) -> Result<AdmissionRequest<DynamicObject>, RequestError> {
    if body.is_empty() {
        return Err(RequestError::EmptyBody);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    // "application/json; charset=utf-8" is still JSON
    if content_type != VALID_CONTENT_TYPE
        && !content_type.starts_with(&format!("{VALID_CONTENT_TYPE};"))
    {
        return Err(RequestError::InvalidContentType(content_type.to_string()));
    }

    let review: AdmissionReview<DynamicObject> = serde_json::from_slice(body)?;
    let request: AdmissionRequest<DynamicObject> = review.try_into()?;
    Ok(request)
}
