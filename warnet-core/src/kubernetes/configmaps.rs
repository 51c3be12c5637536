//! ConfigMap operations
//!
//! Lightning channel definitions travel through ConfigMaps labelled
//! `channels=true`, one per lnd node, holding `source` and `channels`.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, ListParams, Patch, PatchParams};
use serde_json::Value;
use warnet_common::constants::CHANNELS_LABEL;

use super::client::K8sClient;
use crate::error::{WarnetError, WarnetResult};

const FIELD_MANAGER: &str = "warnet";

/// Channels declared in one channels ConfigMap, each tagged with its source
pub fn parse_channels(configmap: &ConfigMap) -> WarnetResult<Vec<Value>> {
    let name = configmap.metadata.name.as_deref().unwrap_or("<unnamed>");
    let data = configmap
        .data
        .as_ref()
        .ok_or_else(|| WarnetError::Validation(format!("ConfigMap {} has no data", name)))?;

    let source = data.get("source").ok_or_else(|| {
        WarnetError::Validation(format!("ConfigMap {} has no 'source' key", name))
    })?;
    let raw = data.get("channels").ok_or_else(|| {
        WarnetError::Validation(format!("ConfigMap {} has no 'channels' key", name))
    })?;

    let channels: Vec<Value> = serde_json::from_str(raw)?;
    channels
        .into_iter()
        .map(|mut channel| match channel.as_object_mut() {
            Some(obj) => {
                obj.insert("source".to_string(), Value::String(source.clone()));
                Ok(channel)
            }
            None => Err(WarnetError::Validation(format!(
                "ConfigMap {} holds a channel that is not an object",
                name
            ))),
        })
        .collect()
}

/// Every channel declared in a namespace
pub async fn get_channels(client: &K8sClient, namespace: Option<&str>) -> WarnetResult<Vec<Value>> {
    let configmaps: Api<ConfigMap> =
        Api::namespaced(client.inner().clone(), client.namespace_or(namespace));
    let lp = ListParams::default().labels(&format!("{}=true", CHANNELS_LABEL));

    let mut channels = Vec::new();
    for cm in configmaps.list(&lp).await?.items {
        channels.extend(parse_channels(&cm)?);
    }
    Ok(channels)
}

/// Create or update a ConfigMap with server-side apply
pub async fn apply_configmap(client: &K8sClient, configmap: &ConfigMap) -> WarnetResult<ConfigMap> {
    let name = configmap
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| WarnetError::Validation("ConfigMap has no name".to_string()))?;
    let namespace = client.namespace_or(configmap.metadata.namespace.as_deref());

    let configmaps: Api<ConfigMap> = Api::namespaced(client.inner().clone(), namespace);
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let applied = configmaps.patch(name, &params, &Patch::Apply(configmap)).await?;

    tracing::info!("Applied ConfigMap {}/{}", namespace, name);
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn channels_configmap(channels: &str) -> ConfigMap {
        let mut cm = ConfigMap::default();
        cm.metadata.name = Some("tank-0000-ln-channels".to_string());
        cm.data = Some(BTreeMap::from([
            ("source".to_string(), "tank-0000-ln".to_string()),
            ("channels".to_string(), channels.to_string()),
        ]));
        cm
    }

    #[test]
    fn test_parse_channels_tags_source() {
        let cm = channels_configmap(
            r#"[{"id":{"block":300,"index":1},"local_amt":100000,"target":"tank-0001-ln"}]"#,
        );
        let channels = parse_channels(&cm).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0]["source"], "tank-0000-ln");
        assert_eq!(channels[0]["id"]["block"], 300);
    }

    #[test]
    fn test_parse_empty_channels() {
        assert!(parse_channels(&channels_configmap("[]")).unwrap().is_empty());
    }

    #[test]
    fn test_parse_channels_rejects_bad_shapes() {
        assert!(parse_channels(&channels_configmap("[1, 2]")).is_err());
        assert!(parse_channels(&channels_configmap("not json")).is_err());
        assert!(parse_channels(&ConfigMap::default()).is_err());
    }
}
