//! Error types for CA bundle injection.

use thiserror::Error;

/// Per-registration faults. Each registration's injection is independent
/// and best-effort: these are collected and surfaced, never fatal to a
/// whole synchronization run.
#[derive(Error, Debug)]
pub enum InjectError {
    /// The annotation value does not split into namespace/configmap.
    #[error("annotation value {0:?} is not of the form namespace/configmap")]
    MalformedAnnotation(String),

    /// The named source ConfigMap does not exist.
    #[error("source ConfigMap {namespace}/{name} not found")]
    SourceNotFound { namespace: String, name: String },

    /// The source ConfigMap lacks the CA field.
    #[error("no service-ca.crt found in ConfigMap {namespace}/{name}")]
    MissingTrustField { namespace: String, name: String },

    /// Kubernetes API error, including update conflicts. Conflicts are
    /// resolved naturally on the next synchronization tick.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl InjectError {
    /// Check if this fault indicates an update conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, InjectError::Kube(kube::Error::Api(e)) if e.code == 409)
    }
}

/// Result type alias for injection operations
pub type Result<T> = std::result::Result<T, InjectError>;
