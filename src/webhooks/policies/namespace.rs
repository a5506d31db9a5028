//! Namespace validation policy.
//!
//! Protects privileged namespaces (reserved prefixes) from non-admin
//! changes, with a carve-out for layered-product administrators inside
//! the `redhat*` prefix. Rules are evaluated in strict order; the first
//! matching rule wins.

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::DynamicObject;
use regex::Regex;

use crate::webhooks::policies::{is_cluster_admin, is_sre_admin, user_groups};
use crate::webhooks::response::{allowed, denied, errored};
use crate::webhooks::Webhook;

const WEBHOOK_NAME: &str = "namespace-validation";
const WEBHOOK_URI: &str = "/namespace-validation";

const PRIVILEGED_NAMESPACE: &str = r"(^kube.*|^openshift.*|^default$|^redhat.*)";
const PRIVILEGED_SERVICE_ACCOUNTS: &str =
    r"^system:serviceaccounts:(kube.*|openshift.*|default|redhat.*)";
const LAYERED_PRODUCT_NAMESPACE: &str = r"^redhat.*";
const LAYERED_PRODUCT_ADMIN_GROUP: &str = "layered-sre-cluster-admins";

/// Validates Namespace changes.
pub struct NamespaceWebhook {
    privileged_namespace: Regex,
    privileged_service_accounts: Regex,
    layered_product_namespace: Regex,
}

impl NamespaceWebhook {
    /// Patterns are compile-time constants; failing to build them is a
    /// construction-time fault, so this panics rather than propagating.
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self {
            privileged_namespace: Regex::new(PRIVILEGED_NAMESPACE)
                .expect("privileged namespace pattern"),
            privileged_service_accounts: Regex::new(PRIVILEGED_SERVICE_ACCOUNTS)
                .expect("privileged service account pattern"),
            layered_product_namespace: Regex::new(LAYERED_PRODUCT_NAMESPACE)
                .expect("layered product namespace pattern"),
        }
    }
}

/// Pluck the target namespace out of the object, or the old object when
/// the request deletes it.
fn target_namespace(req: &AdmissionRequest<DynamicObject>) -> Option<&DynamicObject> {
    req.old_object.as_ref().or(req.object.as_ref())
}

impl Default for NamespaceWebhook {
    fn default() -> Self {
        Self::new()
    }
}

impl Webhook for NamespaceWebhook {
    fn name(&self) -> &'static str {
        WEBHOOK_NAME
    }

    fn uri(&self) -> &'static str {
        WEBHOOK_URI
    }

    fn validate(&self, req: &AdmissionRequest<DynamicObject>) -> bool {
        req.user_info.username.as_deref().is_some_and(|u| !u.is_empty())
            && req.kind.kind == "Namespace"
    }

    fn authorized(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let Some(ns) = target_namespace(req) else {
            return errored(&req.uid, "could not render a Namespace from the request");
        };
        let ns_name = ns.metadata.name.as_deref().unwrap_or_default();
        let groups = user_groups(req);

        // Service accounts making requests include their namespace in a
        // group name; those local to reserved namespaces are trusted
        // wholesale and left to RBAC.
        if groups
            .iter()
            .any(|g| self.privileged_service_accounts.is_match(g))
        {
            return allowed(req, "Privileged service accounts may access");
        }

        // The layered-product prefix is a subset of the privileged
        // pattern, so this carve-out must come first.
        if groups.iter().any(|g| g == LAYERED_PRODUCT_ADMIN_GROUP)
            && self.layered_product_namespace.is_match(ns_name)
        {
            return allowed(req, "Layered product admins may access");
        }

        if self.privileged_namespace.is_match(ns_name) {
            let username = req.user_info.username.as_deref().unwrap_or_default();
            if is_cluster_admin(username) || is_sre_admin(groups) {
                return allowed(req, "Cluster and SRE admins may access");
            }
            return denied(req, "Non-admin access attempt to privileged namespace");
        }

        allowed(req, "RBAC allowed")
    }

    fn rules(&self) -> Vec<RuleWithOperations> {
        vec![RuleWithOperations {
            operations: Some(vec![
                "CREATE".to_string(),
                "UPDATE".to_string(),
                "DELETE".to_string(),
            ]),
            api_groups: Some(vec![String::new()]),
            api_versions: Some(vec!["*".to_string()]),
            resources: Some(vec!["namespaces".to_string()]),
            scope: Some("Cluster".to_string()),
        }]
    }
}
