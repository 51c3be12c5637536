//! Error types for warnet operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarnetError {
    /// Error from kube-rs client
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubernetes resource not found
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    ResourceNotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Invalid or unreadable kubeconfig
    #[error("Invalid kubeconfig: {0}")]
    InvalidKubeconfig(String),

    /// Helm operation error
    #[error("Helm error: {0}")]
    Helm(String),

    /// Exec session error
    #[error("Exec error: {0}")]
    Exec(String),

    /// An external program exited unsuccessfully
    #[error("Command `{command}` failed: {output}")]
    Command { command: String, output: String },

    /// A chart value is missing or has the wrong shape
    #[error("Invalid chart values: {0}")]
    InvalidValues(String),

    /// TLS material is not PEM encoded
    #[error("Invalid PEM in {0}")]
    InvalidPem(String),

    /// Scaffolding target already exists
    #[error("Directory already exists: {0}")]
    AlreadyExists(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<warnet_common::Error> for WarnetError {
    fn from(err: warnet_common::Error) -> Self {
        match err {
            warnet_common::Error::Io(e) => WarnetError::Io(e),
            warnet_common::Error::Yaml(e) => WarnetError::Yaml(e),
            other => WarnetError::Validation(other.to_string()),
        }
    }
}

impl WarnetError {
    /// True when the API server answered 403
    pub fn is_forbidden(&self) -> bool {
        matches!(self, WarnetError::Kube(kube::Error::Api(resp)) if resp.code == 403)
    }

    /// True when the API server answered 404
    pub fn is_not_found(&self) -> bool {
        match self {
            WarnetError::Kube(kube::Error::Api(resp)) => resp.code == 404,
            WarnetError::ResourceNotFound { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for warnet operations
pub type WarnetResult<T> = std::result::Result<T, WarnetError>;
