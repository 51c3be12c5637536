//! Kubernetes integration for warnet
//!
//! Provides the cluster access warnet needs:
//! - Client construction from kubeconfig or in-cluster config
//! - Kubeconfig inspection and rewriting
//! - Pod discovery by mission, readiness waits and log streaming
//! - Channel ConfigMaps
//! - Exec into tanks, file upload and download
//! - Namespace and RBAC checks
//! - Raw object apply through kubectl

pub mod client;
pub mod configmaps;
pub mod exec;
pub mod kubeconfig;
pub mod namespaces;
pub mod objects;
pub mod pods;

pub use client::K8sClient;
pub use exec::ExecOutput;
