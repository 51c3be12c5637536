//! bitcoin-cli access to tanks

use k8s_openapi::api::core::v1::Pod;
use warnet_common::constants::CHAIN_LABEL;
use warnet_common::Chain;

use crate::error::WarnetResult;
use crate::kubernetes::{exec, pods, K8sClient};

/// Chain a pod runs, from its `chain` label; unlabelled pods are regtest
pub fn pod_chain(pod: &Pod) -> WarnetResult<Chain> {
    match pods::label(pod, CHAIN_LABEL) {
        Some(chain) => Ok(chain.parse()?),
        None => Ok(Chain::default()),
    }
}

/// Argument vector for one bitcoin-cli call
pub fn cli_command(chain: Chain, method: &str, params: &[String]) -> Vec<String> {
    let mut command = vec!["bitcoin-cli".to_string()];
    if !chain.cli_flag().is_empty() {
        command.push(chain.cli_flag().to_string());
    }
    command.push(method.to_string());
    command.extend(params.iter().cloned());
    command
}

/// Run `bitcoin-cli <method> <params...>` inside a tank
pub async fn rpc(
    client: &K8sClient,
    tank: &str,
    method: &str,
    params: &[String],
    namespace: Option<&str>,
) -> WarnetResult<String> {
    let pod = pods::get_pod(client, tank, namespace).await?;
    let chain = pod_chain(&pod)?;
    let namespace = pod.metadata.namespace.as_deref().or(namespace);

    exec::exec_command(client, tank, None, &cli_command(chain, method, params), namespace)
        .await?
        .into_stdout("bitcoin-cli")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_cli_command() {
        assert_eq!(
            cli_command(Chain::Regtest, "getblockcount", &[]),
            vec!["bitcoin-cli", "-regtest", "getblockcount"]
        );
        assert_eq!(
            cli_command(Chain::Main, "getblock", &["abc".to_string(), "2".to_string()]),
            vec!["bitcoin-cli", "getblock", "abc", "2"]
        );
    }

    #[test]
    fn test_pod_chain() {
        let mut pod = Pod::default();
        assert_eq!(pod_chain(&pod).unwrap(), Chain::Regtest);

        pod.metadata.labels = Some(BTreeMap::from([(CHAIN_LABEL.to_string(), "signet".to_string())]));
        assert_eq!(pod_chain(&pod).unwrap(), Chain::Signet);

        pod.metadata.labels = Some(BTreeMap::from([(CHAIN_LABEL.to_string(), "doge".to_string())]));
        assert!(pod_chain(&pod).is_err());
    }
}
