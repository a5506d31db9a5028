//! Policy modules for admission validation.
//!
//! Each module is a self-contained decision procedure over the decoded
//! admission request. Policies are pure functions of the request; none
//! of them performs outbound calls during authorization.

pub mod group;
pub mod identity;
pub mod namespace;
pub mod regular_user;
pub mod subscription;

use kube::core::admission::AdmissionRequest;
use kube::core::DynamicObject;

/// Users treated as cluster administrators regardless of group membership.
pub const CLUSTER_ADMIN_USERS: [&str; 2] = ["kube:admin", "system:admin"];

/// Groups treated as fully privileged SRE administrators.
pub const SRE_ADMIN_GROUPS: [&str; 2] = ["osd-sre-admins", "osd-sre-cluster-admins"];

/// The customer-facing admin group with elevated but bounded privileges.
pub const DEDICATED_ADMIN_GROUP: &str = "dedicated-admins";

/// The requester's groups, empty when the request carries none.
pub(crate) fn user_groups(req: &AdmissionRequest<DynamicObject>) -> &[String] {
    req.user_info.groups.as_deref().unwrap_or(&[])
}

pub(crate) fn is_cluster_admin(username: &str) -> bool {
    CLUSTER_ADMIN_USERS.contains(&username)
}

pub(crate) fn is_sre_admin(groups: &[String]) -> bool {
    groups
        .iter()
        .any(|g| SRE_ADMIN_GROUPS.contains(&g.as_str()))
}

/// Is the requester a dedicated admin?
pub fn is_dedicated_admin(groups: &[String]) -> bool {
    groups.iter().any(|g| g == DEDICATED_ADMIN_GROUP)
}
