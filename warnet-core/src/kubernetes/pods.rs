//! Pod operations
//!
//! Discovery of tanks, commanders and lightning pods by their `mission`
//! label, readiness waits and log access.

use futures::{AsyncBufReadExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, LogParams};
use kube::runtime::wait::await_condition;
use serde::Serialize;
use std::time::Duration;
use warnet_common::constants::{CHAIN_LABEL, INIT_PEERS_ANNOTATION, MISSION_LABEL};

use super::client::K8sClient;
use super::namespaces;
use crate::error::{WarnetError, WarnetResult};

/// Condensed pod view used by status output
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PodSummary {
    pub name: String,
    pub namespace: String,
    pub mission: Option<String>,
    pub chain: Option<String>,
    pub phase: String,
}

impl From<&Pod> for PodSummary {
    fn from(pod: &Pod) -> Self {
        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            mission: label(pod, MISSION_LABEL).map(String::from),
            chain: label(pod, CHAIN_LABEL).map(String::from),
            phase: pod
                .status
                .as_ref()
                .and_then(|s| s.phase.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Value of a pod label
pub fn label<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(key))
        .map(String::as_str)
}

/// Value of a pod annotation
pub fn annotation<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

/// Number of peers a tank was configured to addnode
pub fn init_peers(pod: &Pod) -> usize {
    annotation(pod, INIT_PEERS_ANNOTATION)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// List pods in every non-internal namespace
pub async fn get_pods(client: &K8sClient) -> WarnetResult<Vec<Pod>> {
    let mut pods = Vec::new();
    for ns in namespaces::get_namespaces(client).await? {
        let Some(name) = ns.metadata.name else {
            continue;
        };
        let api: Api<Pod> = Api::namespaced(client.inner().clone(), &name);
        pods.extend(api.list(&ListParams::default()).await?.items);
    }
    Ok(pods)
}

/// Get a specific pod
pub async fn get_pod(client: &K8sClient, name: &str, namespace: Option<&str>) -> WarnetResult<Pod> {
    let namespace = client.namespace_or(namespace);
    let pods: Api<Pod> = Api::namespaced(client.inner().clone(), namespace);
    match pods.get_opt(name).await? {
        Some(pod) => Ok(pod),
        None => Err(WarnetError::ResourceNotFound {
            kind: "Pod".to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }),
    }
}

/// Keep only pods labelled with the given mission
pub fn filter_mission(pods: Vec<Pod>, mission: &str) -> Vec<Pod> {
    pods.into_iter()
        .filter(|p| label(p, MISSION_LABEL) == Some(mission))
        .collect()
}

/// All pods labelled with a specific mission
pub async fn get_mission(client: &K8sClient, mission: &str) -> WarnetResult<Vec<Pod>> {
    Ok(filter_mission(get_pods(client).await?, mission))
}

/// Exit code of the first terminated container, if any
pub fn exit_status(pod: &Pod) -> Option<i32> {
    pod.status
        .as_ref()?
        .container_statuses
        .as_ref()?
        .iter()
        .find_map(|cs| cs.state.as_ref()?.terminated.as_ref().map(|t| t.exit_code))
}

pub async fn get_pod_exit_status(
    client: &K8sClient,
    name: &str,
    namespace: Option<&str>,
) -> WarnetResult<Option<i32>> {
    Ok(exit_status(&get_pod(client, name, namespace).await?))
}

pub async fn delete_pod(client: &K8sClient, name: &str, namespace: Option<&str>) -> WarnetResult<()> {
    let pods: Api<Pod> = Api::namespaced(client.inner().clone(), client.namespace_or(namespace));
    pods.delete(name, &DeleteParams::default()).await?;
    tracing::info!("Deleted pod {}", name);
    Ok(())
}

/// Running with a true `Ready` condition
pub fn is_pod_ready(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };
    status.phase.as_deref() == Some("Running")
        && status
            .conditions
            .as_ref()
            .map(|cs| cs.iter().any(|c| c.type_ == "Ready" && c.status == "True"))
            .unwrap_or(false)
}

/// Any init container has reached the running state
pub fn is_init_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.init_container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .any(|cs| cs.state.as_ref().and_then(|s| s.running.as_ref()).is_some())
        })
        .unwrap_or(false)
}

async fn wait_for(
    client: &K8sClient,
    name: &str,
    namespace: &str,
    timeout: Duration,
    what: &str,
    cond: fn(&Pod) -> bool,
) -> WarnetResult<bool> {
    let pods: Api<Pod> = Api::namespaced(client.inner().clone(), namespace);
    let condition = move |pod: Option<&Pod>| pod.map(cond).unwrap_or(false);

    match tokio::time::timeout(timeout, await_condition(pods, name, condition)).await {
        Ok(result) => {
            result.map_err(|e| WarnetError::Internal(format!("watch on {} failed: {}", name, e)))?;
            tracing::debug!("{} in pod {} ({}) is ready", what, name, namespace);
            Ok(true)
        }
        Err(_) => {
            tracing::warn!("Timeout waiting for {} in {} ({}) to be ready.", what, name, namespace);
            Ok(false)
        }
    }
}

/// Wait until a pod is running and ready
pub async fn wait_for_pod_ready(
    client: &K8sClient,
    name: &str,
    namespace: Option<&str>,
    timeout: Duration,
) -> WarnetResult<bool> {
    let namespace = client.namespace_or(namespace);
    wait_for(client, name, namespace, timeout, "pod", is_pod_ready).await
}

/// Wait until the pod's init container is running
pub async fn wait_for_init(
    client: &K8sClient,
    name: &str,
    namespace: Option<&str>,
    timeout: Duration,
) -> WarnetResult<bool> {
    let namespace = client.namespace_or(namespace);
    wait_for(client, name, namespace, timeout, "initContainer", is_init_running).await
}

/// Poll until the pod leaves the Pending phase or the timeout runs out
pub async fn wait_for_pod(
    client: &K8sClient,
    name: &str,
    namespace: Option<&str>,
    timeout: Duration,
) -> WarnetResult<()> {
    let pods: Api<Pod> = Api::namespaced(client.inner().clone(), client.namespace_or(namespace));
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        let pod = pods.get_status(name).await?;
        let phase = pod.status.and_then(|s| s.phase);
        if phase.as_deref() != Some("Pending") {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Ok(())
}

/// Read a pod's log, optionally following it, handing each line to `on_line`
pub async fn pod_log<F>(
    client: &K8sClient,
    name: &str,
    container: Option<&str>,
    follow: bool,
    namespace: Option<&str>,
    mut on_line: F,
) -> WarnetResult<()>
where
    F: FnMut(&str),
{
    let pods: Api<Pod> = Api::namespaced(client.inner().clone(), client.namespace_or(namespace));
    let params = LogParams {
        container: container.map(String::from),
        follow,
        ..Default::default()
    };

    let reader = pods.log_stream(name, &params).await?;
    let mut lines = std::pin::pin!(reader.lines());
    while let Some(line) = lines.try_next().await? {
        on_line(&line);
    }
    Ok(())
}
