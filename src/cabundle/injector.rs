//! CA bundle injection into webhook registrations.
//!
//! Webhook registrations that want their trust material managed carry an
//! annotation naming a `namespace/configmap` source. The injector reads
//! the source's `service-ca.crt` field and rewrites each registration
//! entry whose embedded bundle is stale. The write is idempotent: a
//! registration whose entries already match is never updated.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use k8s_openapi::api::admissionregistration::v1::ValidatingWebhookConfiguration;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::ByteString;
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cabundle::error::{InjectError, Result};

/// Registrations carrying this annotation get their CA bundle managed.
/// The value names the source as `namespace/configmap`.
pub const INJECT_ANNOTATION: &str = "managed.openshift.io/inject-cabundle-from";

/// The ConfigMap field holding the PEM-encoded CA material.
pub const SERVICE_CA_KEY: &str = "service-ca.crt";

/// Encode CA material for embedding: trim, then unpadded standard
/// base64. Byte-for-byte stability matters; consumers compare the
/// embedded value verbatim.
pub fn encode_bundle(pem: &str) -> String {
    STANDARD_NO_PAD.encode(pem.trim())
}

/// Outcome of one synchronization run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Registrations rewritten because at least one entry was stale.
    pub updated: usize,
    /// Registrations whose entries already matched the source.
    pub unchanged: usize,
    /// Per-registration faults, keyed by registration name.
    pub faults: Vec<(String, InjectError)>,
}

/// Keeps the trust material embedded in webhook registrations in sync
/// with its ConfigMap source.
pub struct CaBundleInjector {
    client: Client,
    // Overlapping triggers are serialized, not parallelized: concurrent
    // conflicting writes to the same registration would be lost updates.
    lock: Mutex<()>,
}

impl CaBundleInjector {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            lock: Mutex::new(()),
        }
    }

    /// Run one synchronization pass over every annotated registration.
    ///
    /// Idempotent and safe to invoke repeatedly. A fault on one
    /// registration is recorded and does not abort the rest; only a
    /// failure to list the registrations at all fails the run.
    pub async fn synchronize(&self) -> Result<SyncReport> {
        let _guard = self.lock.lock().await;

        let api: Api<ValidatingWebhookConfiguration> = Api::all(self.client.clone());
        let configs = api.list(&ListParams::default()).await?;

        let mut report = SyncReport::default();
        for config in configs.items {
            let Some(source) = config
                .annotations()
                .get(INJECT_ANNOTATION)
                .cloned()
            else {
                continue;
            };
            let name = config.name_any();
            match self.inject_one(&api, config, &source).await {
                Ok(true) => {
                    info!(registration = %name, source = %source, "Updated CA bundle");
                    report.updated += 1;
                }
                Ok(false) => {
                    debug!(registration = %name, "CA bundle already current");
                    report.unchanged += 1;
                }
                Err(e) => {
                    warn!(registration = %name, error = %e, "Skipping registration");
                    report.faults.push((name, e));
                }
            }
        }
        Ok(report)
    }

    /// Inject the source bundle into one registration. Returns whether a
    /// write was issued.
    async fn inject_one(
        &self,
        api: &Api<ValidatingWebhookConfiguration>,
        mut config: ValidatingWebhookConfiguration,
        source: &str,
    ) -> Result<bool> {
        let (namespace, configmap) = split_source(source)?;
        let cert = self.ca_certificate(namespace, configmap).await?;
        let encoded = ByteString(encode_bundle(&cert).into_bytes());

        if !apply_bundle(&mut config, &encoded) {
            return Ok(false);
        }

        let name = config.name_any();
        api.replace(&name, &PostParams::default(), &config).await?;
        Ok(true)
    }

    /// Fetch the CA material from the named source ConfigMap.
    async fn ca_certificate(&self, namespace: &str, name: &str) -> Result<String> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let cm = match api.get(name).await {
            Ok(cm) => cm,
            Err(kube::Error::Api(e)) if e.code == 404 => {
                return Err(InjectError::SourceNotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        cm.data
            .as_ref()
            .and_then(|data| data.get(SERVICE_CA_KEY))
            .cloned()
            .ok_or_else(|| InjectError::MissingTrustField {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

/// Split an annotation value into its (namespace, configmap) halves.
fn split_source(source: &str) -> Result<(&str, &str)> {
    match source.split_once('/') {
        Some((namespace, name))
            if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((namespace, name))
        }
        _ => Err(InjectError::MalformedAnnotation(source.to_string())),
    }
}

/// Rewrite every webhook entry whose embedded bundle differs from the
/// encoded source. Returns whether anything changed.
fn apply_bundle(config: &mut ValidatingWebhookConfiguration, encoded: &ByteString) -> bool {
    let mut changed = false;
    if let Some(webhooks) = config.webhooks.as_mut() {
        for webhook in webhooks.iter_mut() {
            if webhook.client_config.ca_bundle.as_ref() != Some(encoded) {
                webhook.client_config.ca_bundle = Some(encoded.clone());
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use k8s_openapi::api::admissionregistration::v1::ValidatingWebhook;

    const TEST_PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----";

    fn registration(entries: usize, bundle: Option<&ByteString>) -> ValidatingWebhookConfiguration {
        let webhooks = (0..entries)
            .map(|i| ValidatingWebhook {
                name: format!("hook-{i}.example.com"),
                client_config: k8s_openapi::api::admissionregistration::v1::WebhookClientConfig {
                    ca_bundle: bundle.cloned(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect();
        ValidatingWebhookConfiguration {
            webhooks: Some(webhooks),
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_bundle_trims_and_is_stable() {
        let padded = format!("\n\n  {TEST_PEM}  \n");
        let encoded = encode_bundle(&padded);
        assert_eq!(encoded, encode_bundle(TEST_PEM));
        // Unpadded standard base64: no trailing '='
        assert!(!encoded.ends_with('='));
        assert_eq!(encoded, STANDARD_NO_PAD.encode(TEST_PEM));
    }

    #[test]
    fn test_split_source() {
        assert_eq!(
            split_source("openshift-service-ca/ca-bundle").unwrap(),
            ("openshift-service-ca", "ca-bundle")
        );
        for bad in ["no-separator", "/missing-ns", "missing-name/", "a/b/c", ""] {
            let err = split_source(bad).unwrap_err();
            assert!(
                matches!(err, InjectError::MalformedAnnotation(_)),
                "{bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_apply_bundle_rewrites_stale_entries() {
        let encoded = ByteString(encode_bundle(TEST_PEM).into_bytes());
        let stale = ByteString(b"out-of-date".to_vec());

        let mut config = registration(3, Some(&stale));
        assert!(apply_bundle(&mut config, &encoded));
        for webhook in config.webhooks.as_ref().unwrap() {
            assert_eq!(webhook.client_config.ca_bundle.as_ref(), Some(&encoded));
        }
    }

    #[test]
    fn test_apply_bundle_is_idempotent() {
        let encoded = ByteString(encode_bundle(TEST_PEM).into_bytes());
        let mut config = registration(2, None);

        // First pass embeds the bundle, second pass issues no writes.
        assert!(apply_bundle(&mut config, &encoded));
        assert!(!apply_bundle(&mut config, &encoded));
    }

    #[test]
    fn test_apply_bundle_without_entries() {
        let encoded = ByteString(encode_bundle(TEST_PEM).into_bytes());
        let mut config = ValidatingWebhookConfiguration::default();
        assert!(!apply_bundle(&mut config, &encoded));
    }
}
