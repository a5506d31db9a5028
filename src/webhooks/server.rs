//! Admission webhook HTTP server.
//!
//! Builds one POST route per registered policy module and drives the
//! shared per-request lifecycle: normalize, structurally validate,
//! authorize, encode.
//!
//! The server prefers TLS (certificates mounted at /service-certs/) and
//! falls back to plain HTTP when no certificates are present, which is
//! only useful for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use tracing::{debug, info, warn};

use crate::health::HealthState;
use crate::webhooks::request::parse_admission_request;
use crate::webhooks::response::{errored, http_status_for, review_response};
use crate::webhooks::{Webhook, WebhookRegistry};

/// Default path to the webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/service-certs/tls.crt";
/// Default path to the webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/service-certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 5000;

/// Errors that can occur while running the webhook server
#[derive(Debug, thiserror::Error)]
pub enum WebhookServerError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("webhook server error: {0}")]
    Server(String),
}

/// Build the admission router: one POST route per registered module.
pub fn build_router(registry: &WebhookRegistry, health: Option<Arc<HealthState>>) -> Router {
    let mut router = Router::new();
    for hook in registry.iter() {
        info!(webhook = hook.name(), uri = hook.uri(), "Serving webhook");
        let hook = Arc::clone(hook);
        let health = health.clone();
        router = router.route(
            hook.uri(),
            post(move |headers: HeaderMap, body: Bytes| {
                let hook = Arc::clone(&hook);
                let health = health.clone();
                async move { handle_request(hook, health, headers, body) }
            }),
        );
    }
    router
}

/// The shared per-request lifecycle for every policy module.
fn handle_request(
    hook: Arc<dyn Webhook>,
    health: Option<Arc<HealthState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match parse_admission_request(&headers, &body) {
        Ok(req) => req,
        Err(e) => {
            warn!(webhook = hook.name(), error = %e, "Error parsing HTTP request body");
            return review_response(StatusCode::BAD_REQUEST, errored("", &e.to_string()));
        }
    };

    if let Some(ref health) = health {
        health.metrics.record_request(hook.name());
    }

    let uid = request.uid.clone();
    debug!(
        webhook = hook.name(),
        uid = %uid,
        operation = ?request.operation,
        username = ?request.user_info.username,
        "Processing admission request"
    );

    if !hook.validate(&request) {
        warn!(webhook = hook.name(), uid = %uid, "Malformed admission request");
        return review_response(
            StatusCode::BAD_REQUEST,
            errored(
                &uid,
                &format!("not a well-formed {} admission request", hook.name()),
            ),
        );
    }

    let decision = hook.authorized(&request);
    if decision.allowed {
        debug!(webhook = hook.name(), uid = %uid, "Admission request allowed");
    } else {
        if let Some(ref health) = health {
            health.metrics.record_denial(hook.name());
        }
        info!(
            webhook = hook.name(),
            uid = %uid,
            reason = ?decision.result.message,
            "Admission request denied"
        );
    }

    review_response(http_status_for(&decision), decision)
}

/// Run the webhook server, with TLS when certificates are provided.
///
/// Binds to 0.0.0.0:5000 and serves every URI in the registry.
pub async fn run_webhook_server(
    registry: Arc<WebhookRegistry>,
    health: Option<Arc<HealthState>>,
    tls: Option<(&str, &str)>,
) -> Result<(), WebhookServerError> {
    use axum_server::tls_rustls::RustlsConfig;

    let app = build_router(&registry, health);
    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));

    match tls {
        Some((cert_path, key_path)) => {
            let config =
                RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
                    .await
                    .map_err(|e| WebhookServerError::TlsConfig(e.to_string()))?;
            info!(port = WEBHOOK_PORT, "Webhook server listening with TLS");
            axum_server::bind_rustls(addr, config)
                .serve(app.into_make_service())
                .await
                .map_err(|e| WebhookServerError::Server(e.to_string()))?;
        }
        None => {
            warn!(
                port = WEBHOOK_PORT,
                "No TLS certificates found, webhook server listening without TLS"
            );
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await
                .map_err(|e| WebhookServerError::Server(e.to_string()))?;
        }
    }

    Ok(())
}
