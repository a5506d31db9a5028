//! Group validation policy.
//!
//! Protects the reserved admin groups (`osd-sre*`, `dedicated-admins`,
//! `cluster-admins`, `layered-cs-sre-admins`) from modification by
//! anyone who is not an SRE admin or cluster admin.

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::DynamicObject;
use regex::Regex;

use crate::webhooks::policies::{is_cluster_admin, is_sre_admin, user_groups};
use crate::webhooks::response::{allowed, denied, errored};
use crate::webhooks::Webhook;

const WEBHOOK_NAME: &str = "group-validation";
const WEBHOOK_URI: &str = "/group-validation";

const PROTECTED_GROUPS: &str =
    r"(^osd-sre.*|^dedicated-admins$|^cluster-admins$|^layered-cs-sre-admins$)";

/// Validates Group changes.
pub struct GroupWebhook {
    protected_groups: Regex,
}

impl GroupWebhook {
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self {
            protected_groups: Regex::new(PROTECTED_GROUPS).expect("protected groups pattern"),
        }
    }
}

impl Default for GroupWebhook {
    fn default() -> Self {
        Self::new()
    }
}

impl Webhook for GroupWebhook {
    fn name(&self) -> &'static str {
        WEBHOOK_NAME
    }

    fn uri(&self) -> &'static str {
        WEBHOOK_URI
    }

    fn validate(&self, req: &AdmissionRequest<DynamicObject>) -> bool {
        req.user_info.username.as_deref().is_some_and(|u| !u.is_empty())
            && req.kind.kind == "Group"
    }

    fn authorized(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let username = req.user_info.username.as_deref().unwrap_or_default();
        // Cluster admins can do anything
        if is_cluster_admin(username) {
            return allowed(req, "Cluster admins may access");
        }

        let Some(group) = req.old_object.as_ref().or(req.object.as_ref()) else {
            return errored(&req.uid, "could not render a Group from the request");
        };
        let group_name = group.metadata.name.as_deref().unwrap_or_default();

        if self.protected_groups.is_match(group_name) {
            if is_sre_admin(user_groups(req)) {
                return allowed(req, "SRE admins may access");
            }
            return denied(req, "Non-admin access attempt to protected group");
        }

        // It isn't protected, so let's not be bothered
        allowed(req, "RBAC allowed")
    }

    fn rules(&self) -> Vec<RuleWithOperations> {
        vec![RuleWithOperations {
            operations: Some(vec![
                "CREATE".to_string(),
                "UPDATE".to_string(),
                "DELETE".to_string(),
            ]),
            api_groups: Some(vec!["user.openshift.io".to_string()]),
            api_versions: Some(vec!["*".to_string()]),
            resources: Some(vec!["groups".to_string()]),
            scope: Some("Cluster".to_string()),
        }]
    }
}
