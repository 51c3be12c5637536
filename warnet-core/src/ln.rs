//! lncli access to lightning pods

use serde_json::Value;

use crate::bitcoin::pod_chain;
use crate::error::{WarnetError, WarnetResult};
use crate::kubernetes::{exec, pods, K8sClient};

/// Argument vector for one lncli call
pub fn cli_command(network: &str, method: &str, params: &[String]) -> Vec<String> {
    let mut command = vec![
        "lncli".to_string(),
        "--network".to_string(),
        network.to_string(),
        method.to_string(),
    ];
    command.extend(params.iter().cloned());
    command
}

/// Run `lncli <method> <params...>` inside a lightning pod
pub async fn rpc(
    client: &K8sClient,
    pod_name: &str,
    method: &str,
    params: &[String],
    namespace: Option<&str>,
) -> WarnetResult<String> {
    let pod = pods::get_pod(client, pod_name, namespace).await?;
    let chain = pod_chain(&pod)?;
    let namespace = pod.metadata.namespace.as_deref().or(namespace);

    exec::exec_command(
        client,
        pod_name,
        None,
        &cli_command(chain.lnd_network(), method, params),
        namespace,
    )
    .await?
    .into_stdout("lncli")
}

fn parse_getinfo(raw: &str) -> WarnetResult<Value> {
    Ok(serde_json::from_str(raw)?)
}

/// `identity_pubkey` out of `lncli getinfo` output
pub fn pubkey_from_getinfo(raw: &str) -> WarnetResult<String> {
    parse_getinfo(raw)?
        .get("identity_pubkey")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| WarnetError::Validation("getinfo has no identity_pubkey".to_string()))
}

/// Host part of the first advertised URI, empty when none are advertised
pub fn host_from_getinfo(raw: &str) -> WarnetResult<String> {
    let info = parse_getinfo(raw)?;
    let first = info
        .get("uris")
        .and_then(Value::as_array)
        .and_then(|uris| uris.first())
        .and_then(Value::as_str);

    match first {
        Some(uri) => uri
            .split_once('@')
            .map(|(_, host)| host.to_string())
            .ok_or_else(|| WarnetError::Validation(format!("malformed node URI '{}'", uri))),
        None => Ok(String::new()),
    }
}

pub async fn pubkey(client: &K8sClient, pod_name: &str, namespace: Option<&str>) -> WarnetResult<String> {
    pubkey_from_getinfo(&rpc(client, pod_name, "getinfo", &[], namespace).await?)
}

pub async fn host(client: &K8sClient, pod_name: &str, namespace: Option<&str>) -> WarnetResult<String> {
    host_from_getinfo(&rpc(client, pod_name, "getinfo", &[], namespace).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GETINFO: &str = r#"{
        "identity_pubkey": "02abc",
        "alias": "tank-0000-ln",
        "uris": ["02abc@tank-0000-ln:9735"]
    }"#;

    #[test]
    fn test_cli_command() {
        assert_eq!(
            cli_command("regtest", "openchannel", &["--node_key".to_string(), "02abc".to_string()]),
            vec!["lncli", "--network", "regtest", "openchannel", "--node_key", "02abc"]
        );
    }

    #[test]
    fn test_pubkey_and_host() {
        assert_eq!(pubkey_from_getinfo(GETINFO).unwrap(), "02abc");
        assert_eq!(host_from_getinfo(GETINFO).unwrap(), "tank-0000-ln:9735");
    }

    #[test]
    fn test_host_without_uris() {
        assert_eq!(host_from_getinfo(r#"{"uris": []}"#).unwrap(), "");
        assert_eq!(host_from_getinfo("{}").unwrap(), "");
    }

    #[test]
    fn test_bad_getinfo() {
        assert!(pubkey_from_getinfo("{}").is_err());
        assert!(host_from_getinfo("not json").is_err());
    }
}
