//! Identity validation policy.
//!
//! Identities minted by the SRE identity provider may only be touched by
//! SRE admins or a small set of privileged users (which includes the
//! authentication operator's service account). Identities from any other
//! provider are left to RBAC.

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use kube::core::DynamicObject;
use serde::Deserialize;

use crate::webhooks::policies::{is_sre_admin, user_groups};
use crate::webhooks::response::{allowed, denied, errored};
use crate::webhooks::Webhook;

const WEBHOOK_NAME: &str = "identity-validation";
const WEBHOOK_URI: &str = "/identity-validation";

const DEFAULT_IDENTITY_PROVIDER: &str = "OpenShift_SRE";

const PRIVILEGED_USERS: [&str; 3] = [
    "kube:admin",
    "system:admin",
    "system:serviceaccount:openshift-authentication:oauth-openshift",
];

/// The fragment of an Identity payload this policy reads.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IdentityFragment {
    provider_name: String,
}

/// Validates Identity changes.
pub struct IdentityWebhook;

impl IdentityWebhook {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IdentityWebhook {
    fn default() -> Self {
        Self::new()
    }
}

impl Webhook for IdentityWebhook {
    fn name(&self) -> &'static str {
        WEBHOOK_NAME
    }

    fn uri(&self) -> &'static str {
        WEBHOOK_URI
    }

    fn validate(&self, req: &AdmissionRequest<DynamicObject>) -> bool {
        req.user_info.username.as_deref().is_some_and(|u| !u.is_empty())
            && req.kind.kind == "Identity"
    }

    fn authorized(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        // On delete, the identity being removed is in the old object.
        let target = if req.operation == Operation::Delete {
            req.old_object.as_ref()
        } else {
            req.object.as_ref()
        };
        let Some(identity) = target else {
            return errored(&req.uid, "could not render an Identity from the request");
        };
        let fragment: IdentityFragment = match serde_json::from_value(identity.data.clone()) {
            Ok(f) => f,
            Err(e) => {
                return errored(&req.uid, &format!("could not decode Identity: {e}"));
            }
        };

        let username = req.user_info.username.as_deref().unwrap_or_default();
        if PRIVILEGED_USERS.contains(&username) {
            return allowed(req, "Privileged users may access");
        }

        if fragment.provider_name == DEFAULT_IDENTITY_PROVIDER {
            if is_sre_admin(user_groups(req)) {
                return allowed(req, "SRE admins may access");
            }
            return denied(req, "Permission denied");
        }

        allowed(req, "Allowed by RBAC")
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
            resources: Some(vec!["identities".to_string()]),
            scope: Some("Cluster".to_string()),
        }]
    }

    fn match_policy(&self) -> &'static str {
        "Exact"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::webhooks::policies::testsupport::{admission_request, TEST_UID};

    fn identity_object(name: &str, provider: &str) -> serde_json::Value {
        serde_json::json!({
            "metadata": {"name": name},
            "providerName": provider,
            "providerUserName": name,
        })
    }

    fn identity_request(
        provider: &str,
        username: &str,
        groups: &[&str],
        operation: &str,
    ) -> kube::core::admission::AdmissionRequest<DynamicObject> {
        let obj = identity_object("some-identity", provider);
        let (object, old_object) = if operation == "DELETE" {
            (None, Some(obj))
        } else {
            (Some(obj), None)
        };
        admission_request("Identity", username, groups, operation, object, old_object)
    }

    #[test]
    fn test_privileged_users_allowed() {
        let hook = IdentityWebhook::new();
        for user in [
            "kube:admin",
            "system:admin",
            "system:serviceaccount:openshift-authentication:oauth-openshift",
        ] {
            let req = identity_request("OpenShift_SRE", user, &[], "UPDATE");
            assert!(hook.authorized(&req).allowed, "{user} should be allowed");
        }
    }

    #[test]
    fn test_sre_provider_requires_admin_group() {
        let hook = IdentityWebhook::new();
        let outsider = identity_request("OpenShift_SRE", "test-user", &[], "UPDATE");
        let resp = hook.authorized(&outsider);
        assert!(!resp.allowed);
        assert_eq!(resp.uid, TEST_UID);

        let sre = identity_request("OpenShift_SRE", "test-user", &["osd-sre-admins"], "UPDATE");
        assert!(hook.authorized(&sre).allowed);
    }

    #[test]
    fn test_other_provider_left_to_rbac() {
        let hook = IdentityWebhook::new();
        let req = identity_request("github", "test-user", &[], "UPDATE");
        assert!(hook.authorized(&req).allowed);
    }

    #[test]
    fn test_delete_reads_old_object() {
        let hook = IdentityWebhook::new();
        let req = identity_request("OpenShift_SRE", "test-user", &[], "DELETE");
        assert!(!hook.authorized(&req).allowed);
    }

    #[test]
    fn test_missing_object_is_a_structural_error() {
        let hook = IdentityWebhook::new();
        let req = admission_request("Identity", "test-user", &[], "UPDATE", None, None);
        let resp = hook.authorized(&req);
        assert!(!resp.allowed);
        assert_eq!(resp.result.code, Some(400));
        assert_eq!(resp.uid, TEST_UID);
    }

    #[test]
    fn test_payload_without_provider_is_unprotected() {
        let hook = IdentityWebhook::new();
        let req = admission_request(
            "Identity",
            "test-user",
            &[],
            "UPDATE",
            Some(serde_json::json!({"metadata": {"name": "x"}})),
            None,
        );
        assert!(hook.authorized(&req).allowed);
    }
}
