//! Admission webhook framework.
//!
//! Every policy module implements the [`Webhook`] trait and is composed
//! into an immutable [`WebhookRegistry`] at process start. The registry
//! maps request URIs to long-lived module instances and is the single
//! source of truth for the registration metadata (`name`, `uri`, trigger
//! rules, failure policy) that deployment tooling consumes.

pub mod policies;
pub mod request;
pub mod response;
mod server;

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::DynamicObject;
use thiserror::Error;

pub use request::{parse_admission_request, RequestError};
pub use server::{
    build_router, run_webhook_server, WebhookServerError, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH,
    WEBHOOK_PORT,
};

/// What a ValidatingWebhookConfiguration should do when the service
/// backing a webhook is unreachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Admit the request as if the webhook had allowed it.
    Ignore,
    /// Reject the request.
    Fail,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Ignore => "Ignore",
            FailurePolicy::Fail => "Fail",
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single admission policy module.
///
/// Instances are constructed once at startup, hold no request-scoped
/// state, and are invoked concurrently by many requests.
pub trait Webhook: Send + Sync {
    /// Registration name of this webhook.
    fn name(&self) -> &'static str;

    /// URI this webhook answers at.
    fn uri(&self) -> &'static str;

    /// Structural validation: is this request shaped for this module?
    fn validate(&self, req: &AdmissionRequest<DynamicObject>) -> bool;

    /// The policy decision. Implementations must stamp the request uid
    /// into the response on every path.
    fn authorized(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse;

    /// Resource kinds and operations this webhook should trigger on.
    fn rules(&self) -> Vec<RuleWithOperations>;

    /// How the registration should behave if this service is missing.
    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Ignore
    }

    fn timeout_seconds(&self) -> i32 {
        2
    }

    fn side_effects(&self) -> &'static str {
        "None"
    }

    fn match_policy(&self) -> &'static str {
        "Equivalent"
    }
}

/// Constructor for a webhook module.
pub type WebhookFactory = fn() -> Arc<dyn Webhook>;

/// Errors raised while composing the registry. These are
/// deployment-configuration faults and are fatal at startup.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("webhooks {first} and {second} both claim URI {uri}")]
    DuplicateUri {
        uri: String,
        first: String,
        second: String,
    },
}

/// Immutable URI-to-module mapping, built once at process start.
pub struct WebhookRegistry {
    hooks: BTreeMap<&'static str, Arc<dyn Webhook>>,
}

impl WebhookRegistry {
    /// Build a registry from an explicit factory list. Each factory is
    /// invoked exactly once; a duplicate URI is a construction error.
    pub fn new(factories: &[WebhookFactory]) -> Result<Self, RegistryError> {
        let mut hooks: BTreeMap<&'static str, Arc<dyn Webhook>> = BTreeMap::new();
        for factory in factories {
            let hook = factory();
            if let Some(existing) = hooks.get(hook.uri()) {
                return Err(RegistryError::DuplicateUri {
                    uri: hook.uri().to_string(),
                    first: existing.name().to_string(),
                    second: hook.name().to_string(),
                });
            }
            hooks.insert(hook.uri(), hook);
        }
        Ok(Self { hooks })
    }

    /// Registry wired with the full production module set.
    pub fn default_set() -> Result<Self, RegistryError> {
        Self::new(&default_factories())
    }

    pub fn get(&self, uri: &str) -> Option<&Arc<dyn Webhook>> {
        self.hooks.get(uri)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Webhook>> {
        self.hooks.values()
    }

    pub fn uris(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.hooks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// The production policy modules.
pub fn default_factories() -> Vec<WebhookFactory> {
    vec![
        || Arc::new(policies::namespace::NamespaceWebhook::new()),
        || Arc::new(policies::group::GroupWebhook::new()),
        || Arc::new(policies::identity::IdentityWebhook::new()),
        || Arc::new(policies::regular_user::RegularUserWebhook::new()),
        || Arc::new(policies::subscription::SubscriptionWebhook::new()),
    ]
}
