//! `warnet namespaces`: one namespace per team, with a service account per user

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tabled::Tabled;
use warnet_core::kubernetes::{kubeconfig, namespaces};
use warnet_core::kubernetes::objects::{
    apply_kubernetes_yaml_obj, create_kubernetes_object, set_kubectl_context,
};

use super::Context;
use crate::output;
use crate::NamespaceCommands;

#[derive(Tabled, Serialize)]
struct NamespaceRow {
    namespace: String,
    service_accounts: String,
}

fn namespace_object(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": name },
    })
}

fn service_account_object(user: &str, namespace: &str) -> Value {
    let mut metadata = Map::new();
    metadata.insert("name".to_string(), Value::String(user.to_string()));
    create_kubernetes_object("ServiceAccount", metadata, None, namespace)
}

pub async fn handle_namespaces_command(command: NamespaceCommands, ctx: &Context) -> Result<()> {
    match command {
        NamespaceCommands::List { prefix } => {
            let client = ctx.client().await?;
            let found = match prefix.as_deref() {
                Some(prefix) => namespaces::get_namespaces_by_type(&client, prefix).await?,
                None => namespaces::get_namespaces(&client).await?,
            };

            let mut rows = Vec::new();
            for name in found.into_iter().filter_map(|ns| ns.metadata.name) {
                let accounts = namespaces::get_service_accounts_in_namespace(&client, &name).await?;
                rows.push(NamespaceRow {
                    namespace: name,
                    service_accounts: accounts.join(", "),
                });
            }
            output::print_output(rows, ctx.output)?;
        }

        NamespaceCommands::Create { name, users } => {
            apply_kubernetes_yaml_obj(&namespace_object(&name)).await?;
            for user in &users {
                apply_kubernetes_yaml_obj(&service_account_object(user, &name)).await?;
            }
            output::print_success(&format!(
                "Created namespace {} with {} service accounts",
                name,
                users.len()
            ));
        }

        NamespaceCommands::Use { name } => {
            match ctx.kubeconfig.as_deref() {
                // kubectl only edits its own default file
                Some(path) => {
                    let mut config = kubeconfig::open_kubeconfig(path)?;
                    kubeconfig::set_namespace_of_current_context(&mut config, &name)?;
                    kubeconfig::write_kubeconfig(&config, path)?;
                }
                None => set_kubectl_context(&name).await?,
            }
            output::print_success(&format!("kubectl now defaults to {}", name));
        }

        NamespaceCommands::Destroy { name, prefix } => {
            let client = ctx.client().await?;
            let targets: Vec<String> = match (name, prefix) {
                (Some(name), _) => vec![name],
                (None, Some(prefix)) => namespaces::get_namespaces_by_type(&client, &prefix)
                    .await?
                    .into_iter()
                    .filter_map(|ns| ns.metadata.name)
                    .collect(),
                (None, None) => bail!("Name a namespace or pass --prefix"),
            };

            if targets.is_empty() {
                output::print_warning("No matching namespaces");
            }
            for target in &targets {
                namespaces::delete_namespace(&client, target).await?;
                output::print_success(&format!("Deleted namespace {}", target));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_object() {
        let ns = namespace_object("wargames-red");
        assert_eq!(ns["kind"], "Namespace");
        assert_eq!(ns["metadata"]["name"], "wargames-red");
        assert!(ns["metadata"].get("namespace").is_none());
    }

    #[test]
    fn test_service_account_object() {
        let sa = service_account_object("alice", "wargames-red");
        assert_eq!(sa["kind"], "ServiceAccount");
        assert_eq!(sa["apiVersion"], "v1");
        assert_eq!(sa["metadata"]["name"], "alice");
        assert_eq!(sa["metadata"]["namespace"], "wargames-red");
        assert!(sa.get("spec").is_none());
    }
}
