//! Kubernetes client wrapper
//!
//! Wraps the kube-rs Client with the namespace warnet operates in.

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use warnet_common::constants::DEFAULT_NAMESPACE;

use super::kubeconfig;
use crate::error::{WarnetError, WarnetResult};

/// Wrapper around kube-rs Client with namespace context
#[derive(Clone)]
pub struct K8sClient {
    inner: Client,
    namespace: String,
    api_server: String,
}

impl K8sClient {
    /// Connect using a kubeconfig file.
    ///
    /// `path` falls back to `$KUBECONFIG` / `~/.kube/config`. The working
    /// namespace is `namespace` if given, otherwise the namespace of the
    /// current context, otherwise [`DEFAULT_NAMESPACE`].
    pub async fn connect(path: Option<&Path>, namespace: Option<&str>) -> WarnetResult<Self> {
        let kubeconfig = match path {
            Some(p) => kubeconfig::open_kubeconfig(p)?,
            None => Kubeconfig::read().map_err(|e| {
                WarnetError::InvalidKubeconfig(format!("Failed to read kubeconfig: {}", e))
            })?,
        };

        let api_server = kubeconfig::cluster_of_current_context(&kubeconfig)?
            .cluster
            .and_then(|c| c.server)
            .unwrap_or_default();

        let namespace = namespace
            .map(String::from)
            .or_else(|| kubeconfig::namespace_of_current_context(&kubeconfig))
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| WarnetError::InvalidKubeconfig(format!("Failed to create config: {}", e)))?;

        let client = Client::try_from(config)
            .map_err(|e| WarnetError::InvalidKubeconfig(format!("Failed to create client: {}", e)))?;

        tracing::debug!("Connected to {} (namespace {})", api_server, namespace);

        Ok(Self {
            inner: client,
            namespace,
            api_server,
        })
    }

    /// Get the inner kube-rs Client
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Namespace used when a caller doesn't name one
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The given namespace, or the client's default
    pub fn namespace_or<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.unwrap_or(&self.namespace)
    }

    pub fn api_server(&self) -> &str {
        &self.api_server
    }

    /// Check if the cluster is reachable
    pub async fn health_check(&self) -> WarnetResult<String> {
        let version = self.inner.apiserver_version().await?;
        Ok(version.git_version)
    }
}

impl std::fmt::Debug for K8sClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K8sClient")
            .field("namespace", &self.namespace)
            .field("api_server", &self.api_server)
            .finish()
    }
}
