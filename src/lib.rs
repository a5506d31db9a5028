//! managed-webhooks library crate
//!
//! Validating admission webhooks for managed Kubernetes clusters, plus
//! the CA bundle synchronizer that keeps their registrations trusted.

pub mod cabundle;
pub mod health;
pub mod webhooks;

pub use cabundle::{run_cabundle_sync, CaBundleInjector, SyncReport, SYNC_PERIOD};
pub use health::HealthState;
pub use webhooks::{
    run_webhook_server, RegistryError, Webhook, WebhookRegistry, WebhookServerError,
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
};
