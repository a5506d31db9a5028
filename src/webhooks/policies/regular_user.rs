//! Regular-user validation policy.
//!
//! Applies across the managed API groups rather than to a single kind:
//! cluster-internal users and SRE admins pass, everyone else is denied.
//! A request from `system:unauthenticated` is denied loudly since it
//! usually points at an RBAC misconfiguration.

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::DynamicObject;
use tracing::warn;

use crate::webhooks::policies::{is_sre_admin, user_groups};
use crate::webhooks::response::{allowed, denied};
use crate::webhooks::Webhook;

const WEBHOOK_NAME: &str = "regular-user-validation";
const WEBHOOK_URI: &str = "/regular-user-validation";

const UNAUTHENTICATED_USER: &str = "system:unauthenticated";
const CLUSTER_INTERNAL_PREFIX: &str = "kube:";

/// The managed API groups ordinary users must not touch directly.
const PROTECTED_API_GROUPS: [&str; 6] = [
    "autoscaling.openshift.io",
    "cloudcredential.openshift.io",
    "machine.openshift.io",
    "admissionregistration.k8s.io",
    "cloudingress.managed.openshift.io",
    "veleros.managed.openshift.io",
];

/// Denies changes to managed resources from anyone who is not an admin.
pub struct RegularUserWebhook;

impl RegularUserWebhook {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RegularUserWebhook {
    fn default() -> Self {
        Self::new()
    }
}

impl Webhook for RegularUserWebhook {
    fn name(&self) -> &'static str {
        WEBHOOK_NAME
    }

    fn uri(&self) -> &'static str {
        WEBHOOK_URI
    }

    fn validate(&self, req: &AdmissionRequest<DynamicObject>) -> bool {
        req.user_info.username.as_deref().is_some_and(|u| !u.is_empty())
    }

    fn authorized(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let username = req.user_info.username.as_deref().unwrap_or_default();

        if username == UNAUTHENTICATED_USER {
            // An unauthenticated user should have no permissions at all,
            // so reaching this webhook is an RBAC misconfiguration signal.
            warn!(
                uid = %req.uid,
                resource = ?req.resource,
                "system:unauthenticated made a webhook request. Check RBAC rules"
            );
            return denied(req, "Unauthenticated");
        }

        if username.starts_with(CLUSTER_INTERNAL_PREFIX) {
            return allowed(req, "");
        }

        if is_sre_admin(user_groups(req)) {
            return allowed(req, "");
        }

        denied(req, "Denied")
    }

    fn rules(&self) -> Vec<RuleWithOperations> {
        let all_scopes = Some("*".to_string());
        let mut rules = vec![RuleWithOperations {
            operations: Some(vec!["*".to_string()]),
            api_groups: Some(
                PROTECTED_API_GROUPS
                    .iter()
                    .map(|g| g.to_string())
                    .collect(),
            ),
            api_versions: Some(vec!["*".to_string()]),
            resources: Some(vec!["*/*".to_string()]),
            scope: all_scopes.clone(),
        }];
        rules.push(RuleWithOperations {
            operations: Some(vec!["*".to_string()]),
            api_groups: Some(vec!["config.openshift.io".to_string()]),
            api_versions: Some(vec!["*".to_string()]),
            resources: Some(vec![
                "clusterversions".to_string(),
                "clusterversions/status".to_string(),
            ]),
            scope: all_scopes.clone(),
        });
        rules.push(RuleWithOperations {
            operations: Some(vec!["*".to_string()]),
            api_groups: Some(vec![String::new()]),
            api_versions: Some(vec!["*".to_string()]),
            resources: Some(vec!["nodes".to_string(), "nodes/*".to_string()]),
            scope: all_scopes.clone(),
        });
        rules.push(RuleWithOperations {
            operations: Some(vec!["*".to_string()]),
            api_groups: Some(vec!["managed.openshift.io".to_string()]),
            api_versions: Some(vec!["*".to_string()]),
            resources: Some(vec![
                "subjectpermissions".to_string(),
                "subjectpermissions/*".to_string(),
            ]),
            scope: all_scopes,
        });
        rules
    }
}
