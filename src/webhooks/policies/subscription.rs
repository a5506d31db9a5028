//! Subscription validation policy.
//!
//! Dedicated admins may only touch Subscriptions in a safelisted set of
//! namespaces (by default just the marketplace namespace); anyone else
//! is left to RBAC.

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::DynamicObject;
use tracing::info;

use crate::webhooks::policies::{is_dedicated_admin, user_groups};
use crate::webhooks::response::{allowed, denied, errored};
use crate::webhooks::Webhook;

const WEBHOOK_NAME: &str = "subscription-validation";
const WEBHOOK_URI: &str = "/subscription-validation";

/// Environment override for the safelist, a comma-separated namespace list.
pub const SAFELIST_ENV: &str = "SUBSCRIPTION_VALIDATION_NAMESPACES";

const DEFAULT_SAFELISTED_NAMESPACE: &str = "openshift-marketplace";

/// Validates Subscription changes.
pub struct SubscriptionWebhook {
    safelisted_namespaces: Vec<String>,
}

impl SubscriptionWebhook {
    /// Reads the safelist override from the environment once; the
    /// instance is immutable afterwards.
    pub fn new() -> Self {
        let raw = std::env::var(SAFELIST_ENV)
            .unwrap_or_else(|_| DEFAULT_SAFELISTED_NAMESPACE.to_string());
        Self::with_safelist(raw.split(',').map(str::to_string).collect())
    }

    pub fn with_safelist(safelisted_namespaces: Vec<String>) -> Self {
        Self {
            safelisted_namespaces,
        }
    }
}

impl Default for SubscriptionWebhook {
    fn default() -> Self {
        Self::new()
    }
}

impl Webhook for SubscriptionWebhook {
    fn name(&self) -> &'static str {
        WEBHOOK_NAME
    }

    fn uri(&self) -> &'static str {
        WEBHOOK_URI
    }

    fn validate(&self, req: &AdmissionRequest<DynamicObject>) -> bool {
        req.user_info.username.as_deref().is_some_and(|u| !u.is_empty())
            && req.kind.kind == "Subscription"
    }

    fn authorized(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        // Dedicated admins may only make changes to Subscriptions in the
        // safelisted namespaces; everyone else is RBAC's problem.
        if !is_dedicated_admin(user_groups(req)) {
            return allowed(req, "RBAC allowed");
        }

        let Some(sub) = req.old_object.as_ref().or(req.object.as_ref()) else {
            return errored(&req.uid, "could not render a Subscription from the request");
        };
        let sub_namespace = sub.metadata.namespace.as_deref().unwrap_or_default();

        info!(
            uid = %req.uid,
            username = ?req.user_info.username,
            operation = ?req.operation,
            subscription = ?sub.metadata.name,
            namespace = %sub_namespace,
            safelisted = ?self.safelisted_namespaces,
            "Checking dedicated-admin Subscription access"
        );

        if self
            .safelisted_namespaces
            .iter()
            .any(|ns| ns == sub_namespace)
        {
            return allowed(req, "Dedicated admins may access");
        }
        denied(req, "Dedicated admins may not access")
    }

    fn rules(&self) -> Vec<RuleWithOperations> {
        vec![RuleWithOperations {
            operations: Some(vec![
                "CREATE".to_string(),
                "UPDATE".to_string(),
                "DELETE".to_string(),
            ]),
            api_groups: Some(vec!["operators.coreos.com".to_string()]),
            api_versions: Some(vec!["*".to_string()]),
            resources: Some(vec!["subscriptions".to_string()]),
            scope: Some("Namespaced".to_string()),
        }]
    }
}
