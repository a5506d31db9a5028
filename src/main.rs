//! managed-webhooks - Validating admission webhooks for managed clusters.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client
//! - Composes the policy module registry (fatal on duplicate routes)
//! - Starts the webhook server, health server, and the leader-gated
//!   CA bundle synchronizer

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams};
use tokio::signal;
use tracing::{error, info, warn};

use managed_webhooks::cabundle::{run_cabundle_sync, SYNC_PERIOD};
use managed_webhooks::health::{run_health_server, HealthState};
use managed_webhooks::webhooks::{
    run_webhook_server, WebhookRegistry, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH,
};

/// Lease configuration for the CA bundle synchronizer
const LEASE_NAME: &str = "managed-webhooks-cabundle";
const LEASE_TTL_SECS: u64 = 15;
const LEASE_RENEW_INTERVAL_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("managed_webhooks=info".parse()?)
                .add_directive("kube=info".parse()?)
                .add_directive("kube_leader_election=info".parse()?),
        )
        .json()
        .init();

    info!("Starting managed-webhooks");

    // Duplicate routes among registered modules are a deployment
    // configuration error; refuse to start.
    let registry = Arc::new(WebhookRegistry::default_set()?);
    info!(webhooks = registry.len(), "Composed webhook registry");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Identity for leader election
    let holder_id = std::env::var("POD_NAME").unwrap_or_else(|_| {
        warn!("POD_NAME not set, using hostname");
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    });
    let namespace = std::env::var("POD_NAMESPACE").unwrap_or_else(|_| {
        warn!("POD_NAMESPACE not set, using 'default'");
        "default".to_string()
    });

    // Create shared health state and start the health server immediately
    // (probes should work even before leadership is settled)
    let health_state = Arc::new(HealthState::new());
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // The webhook server runs on every replica; admission traffic is
    // load-balanced by the fronting Service.
    let webhook_handle = {
        let registry = registry.clone();
        let health_state = health_state.clone();
        let tls = if Path::new(WEBHOOK_CERT_PATH).exists() && Path::new(WEBHOOK_KEY_PATH).exists()
        {
            info!("TLS certificates found, serving webhooks over HTTPS");
            Some((WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH))
        } else {
            None
        };
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(registry, Some(health_state), tls).await {
                error!("Webhook server error: {}", e);
            }
        })
    };
    health_state.set_ready(true).await;

    // The CA bundle synchronizer only runs on the leader: concurrent
    // writers patching the same registrations would lose updates.
    let sync_handle = {
        let client = client.clone();
        let health_state = health_state.clone();
        let lease_lock = LeaseLock::new(
            client.clone(),
            &namespace,
            LeaseLockParams {
                holder_id: holder_id.clone(),
                lease_name: LEASE_NAME.to_string(),
                lease_ttl: Duration::from_secs(LEASE_TTL_SECS),
            },
        );

        #[allow(clippy::exit)]
        let handle = tokio::spawn(async move {
            info!(
                holder_id = %holder_id,
                lease_name = LEASE_NAME,
                "Waiting to acquire CA bundle synchronizer lease..."
            );
            loop {
                match lease_lock.try_acquire_or_renew().await {
                    Ok(result) if result.acquired_lease => {
                        info!("Acquired CA bundle synchronizer lease");
                        break;
                    }
                    Ok(_) => {
                        info!("Another instance holds the lease, waiting...");
                    }
                    Err(e) => {
                        warn!("Failed to acquire lease: {}, retrying...", e);
                    }
                }
                tokio::time::sleep(Duration::from_secs(LEASE_RENEW_INTERVAL_SECS)).await;
            }

            // Keep renewing in the background; on loss, exit so
            // Kubernetes restarts us and we re-enter the election.
            let renewal = tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(LEASE_RENEW_INTERVAL_SECS)).await;
                    match lease_lock.try_acquire_or_renew().await {
                        Ok(result) if result.acquired_lease => {}
                        Ok(_) => {
                            error!("Lost CA bundle synchronizer lease! Shutting down...");
                            std::process::exit(1);
                        }
                        Err(e) => {
                            error!("Failed to renew lease: {}. Shutting down...", e);
                            std::process::exit(1);
                        }
                    }
                }
            });

            run_cabundle_sync(client, SYNC_PERIOD, Some(health_state)).await;
            renewal.abort();
        });
        handle
    };

    // Wait for any task to fail, or a shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = sync_handle => {
            if let Err(e) = result {
                error!("CA bundle synchronizer task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, shutting down");
            health_state.set_ready(false).await;
        }
    }

    info!("managed-webhooks stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the process cannot
/// shut down gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
