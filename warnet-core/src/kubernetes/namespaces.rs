//! Namespace and permission operations

use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use warnet_common::constants::KUBE_INTERNAL_NAMESPACES;

use super::client::K8sClient;
use crate::error::{WarnetError, WarnetResult};

fn is_internal(ns: &Namespace) -> bool {
    ns.metadata
        .name
        .as_deref()
        .map(|n| KUBE_INTERNAL_NAMESPACES.contains(&n))
        .unwrap_or(true)
}

/// Drop kube-internal namespaces
pub fn filter_internal(namespaces: Vec<Namespace>) -> Vec<Namespace> {
    namespaces.into_iter().filter(|ns| !is_internal(ns)).collect()
}

/// Keep namespaces whose name starts with `prefix`
pub fn filter_by_prefix(namespaces: Vec<Namespace>, prefix: &str) -> Vec<Namespace> {
    namespaces
        .into_iter()
        .filter(|ns| {
            ns.metadata
                .name
                .as_deref()
                .map(|n| n.starts_with(prefix))
                .unwrap_or(false)
        })
        .collect()
}

/// All non-internal namespaces.
///
/// Users restricted to a single namespace can't list namespaces; for them
/// the client's own namespace is returned.
pub async fn get_namespaces(client: &K8sClient) -> WarnetResult<Vec<Namespace>> {
    let api: Api<Namespace> = Api::all(client.inner().clone());
    match api.list(&ListParams::default()).await {
        Ok(list) => Ok(filter_internal(list.items)),
        Err(e) => {
            let err = WarnetError::from(e);
            if err.is_forbidden() {
                tracing::debug!("Namespace listing forbidden, using {}", client.namespace());
                Ok(vec![api.get(client.namespace()).await?])
            } else {
                Err(err)
            }
        }
    }
}

/// Namespaces of one kind, e.g. every `teamname-` namespace of a battle
pub async fn get_namespaces_by_type(client: &K8sClient, prefix: &str) -> WarnetResult<Vec<Namespace>> {
    Ok(filter_by_prefix(get_namespaces(client).await?, prefix))
}

/// Delete a namespace; a namespace that's already gone is not an error
pub async fn delete_namespace(client: &K8sClient, name: &str) -> WarnetResult<()> {
    let api: Api<Namespace> = Api::all(client.inner().clone());
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            tracing::info!("Kubernetes namespace {} deleted", name);
            Ok(())
        }
        Err(e) => {
            let err = WarnetError::from(e);
            if err.is_not_found() {
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

/// Service accounts in a namespace, minus the one Kubernetes creates itself
pub async fn get_service_accounts_in_namespace(
    client: &K8sClient,
    namespace: &str,
) -> WarnetResult<Vec<String>> {
    let api: Api<ServiceAccount> = Api::namespaced(client.inner().clone(), namespace);
    Ok(api
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter_map(|sa| sa.metadata.name)
        .filter(|name| name != "default")
        .collect())
}

/// Ask the API server whether the current identity may delete pods
pub async fn can_delete_pods(client: &K8sClient, namespace: Option<&str>) -> WarnetResult<bool> {
    let namespace = client.namespace_or(namespace);
    let api: Api<SelfSubjectAccessReview> = Api::all(client.inner().clone());

    let review = SelfSubjectAccessReview {
        spec: SelfSubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                namespace: Some(namespace.to_string()),
                verb: Some("delete".to_string()),
                resource: Some("pods".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };

    let response = api.create(&PostParams::default(), &review).await?;
    let allowed = response.status.map(|s| s.allowed).unwrap_or(false);
    tracing::debug!("delete pods in '{}' allowed: {}", namespace, allowed);
    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str) -> Namespace {
        let mut ns = Namespace::default();
        ns.metadata.name = Some(name.to_string());
        ns
    }

    fn names(list: &[Namespace]) -> Vec<&str> {
        list.iter().filter_map(|n| n.metadata.name.as_deref()).collect()
    }

    #[test]
    fn test_filter_internal() {
        let all = vec![ns("kube-system"), ns("warnet"), ns("kube-public"), ns("red-team")];
        assert_eq!(names(&filter_internal(all)), vec!["warnet", "red-team"]);
    }

    #[test]
    fn test_filter_by_prefix() {
        let all = vec![ns("wargames-red"), ns("warnet"), ns("wargames-blue")];
        assert_eq!(
            names(&filter_by_prefix(all, "wargames-")),
            vec!["wargames-red", "wargames-blue"]
        );
    }
}
