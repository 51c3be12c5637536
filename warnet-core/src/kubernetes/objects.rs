//! Raw object handling through kubectl

use k8s_openapi::api::networking::v1::Ingress;
use kube::api::Api;
use serde_json::{json, Map, Value};
use std::io::Write;
use std::path::Path;
use warnet_common::constants::{CADDY_INGRESS_NAME, LOGGING_NAMESPACE};

use super::client::K8sClient;
use crate::error::WarnetResult;
use crate::process::stream_command;

/// Build a core/v1 object with its namespace filled in
pub fn create_kubernetes_object(
    kind: &str,
    mut metadata: Map<String, Value>,
    spec: Option<Value>,
    namespace: &str,
) -> Value {
    metadata.insert("namespace".to_string(), Value::String(namespace.to_string()));
    let mut obj = json!({
        "apiVersion": "v1",
        "kind": kind,
        "metadata": metadata,
    });
    if let Some(spec) = spec {
        obj["spec"] = spec;
    }
    obj
}

/// `kubectl apply -f <file>`
pub async fn apply_kubernetes_yaml(path: &Path) -> WarnetResult<()> {
    let file = path.to_string_lossy();
    stream_command("kubectl", &["apply", "-f", file.as_ref()]).await?;
    tracing::info!("Kubernetes object applied successfully from {}", file);
    Ok(())
}

/// Apply an in-memory object through a temporary YAML file
pub async fn apply_kubernetes_yaml_obj(obj: &Value) -> WarnetResult<()> {
    let mut temp = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    temp.write_all(serde_yaml::to_string(obj)?.as_bytes())?;
    temp.flush()?;
    apply_kubernetes_yaml(temp.path()).await
}

/// Point the current kubectl context at `namespace`
pub async fn set_kubectl_context(namespace: &str) -> WarnetResult<()> {
    let ns_arg = format!("--namespace={}", namespace);
    stream_command("kubectl", &["config", "set-context", "--current", ns_arg.as_str()]).await?;
    tracing::info!("Kubectl context set to namespace: {}", namespace);
    Ok(())
}

/// Address of the caddy ingress, preferring a hostname over an IP
pub async fn get_ingress_ip_or_host(client: &K8sClient) -> WarnetResult<Option<String>> {
    let api: Api<Ingress> = Api::namespaced(client.inner().clone(), LOGGING_NAMESPACE);
    let Some(ingress) = api.get_opt(CADDY_INGRESS_NAME).await? else {
        return Ok(None);
    };

    Ok(ingress
        .status
        .and_then(|s| s.load_balancer)
        .and_then(|lb| lb.ingress)
        .and_then(|list| list.into_iter().next())
        .and_then(|first| first.hostname.or(first.ip)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_kubernetes_object() {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), json!("tank-0000"));
        let obj = create_kubernetes_object("Pod", metadata, Some(json!({"containers": []})), "warnet");

        assert_eq!(obj["apiVersion"], "v1");
        assert_eq!(obj["kind"], "Pod");
        assert_eq!(obj["metadata"]["namespace"], "warnet");
        assert_eq!(obj["metadata"]["name"], "tank-0000");
        assert!(obj["spec"]["containers"].is_array());
    }

    #[test]
    fn test_create_kubernetes_object_without_spec() {
        let obj = create_kubernetes_object("ConfigMap", Map::new(), None, "default");
        assert!(obj.get("spec").is_none());
    }
}
