//! CA bundle synchronization.
//!
//! Keeps the trust material embedded in the cluster's webhook
//! registrations in sync with its ConfigMap source, so the HTTPS
//! endpoints served by the policy modules stay verifiable. Runs outside
//! the request path.

pub mod error;
mod injector;

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tracing::{error, info};

use crate::health::HealthState;

pub use error::InjectError;
pub use injector::{encode_bundle, CaBundleInjector, SyncReport, INJECT_ANNOTATION, SERVICE_CA_KEY};

/// How often the synchronizer sweeps the webhook registrations.
pub const SYNC_PERIOD: Duration = Duration::from_secs(60);

/// Drive the injector periodically until the process shuts down.
///
/// A failed run is logged and retried on the next tick; it never
/// escalates into a process fault.
pub async fn run_cabundle_sync(client: Client, period: Duration, health: Option<Arc<HealthState>>) {
    let injector = CaBundleInjector::new(client);
    let mut ticker = tokio::time::interval(period);
    info!(period_secs = period.as_secs(), "Starting CA bundle synchronizer");

    loop {
        ticker.tick().await;
        match injector.synchronize().await {
            Ok(report) => {
                if let Some(ref health) = health {
                    health.metrics.record_sync_run(report.faults.len() as u64);
                }
                info!(
                    updated = report.updated,
                    unchanged = report.unchanged,
                    faults = report.faults.len(),
                    "CA bundle synchronization complete"
                );
            }
            Err(e) => {
                if let Some(ref health) = health {
                    health.metrics.record_sync_run(1);
                }
                error!(error = %e, "CA bundle synchronization run failed");
            }
        }
    }
}
