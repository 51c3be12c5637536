//! Kubeconfig inspection and rewriting

use kube::config::{Kubeconfig, NamedCluster};
use std::io::Write;
use std::path::Path;

use crate::error::{WarnetError, WarnetResult};

/// Read and parse a kubeconfig file
pub fn open_kubeconfig(path: &Path) -> WarnetResult<Kubeconfig> {
    if !path.exists() {
        return Err(WarnetError::InvalidKubeconfig(format!(
            "Kubeconfig file {} not found.",
            path.display()
        )));
    }
    Kubeconfig::read_from(path).map_err(|e| {
        WarnetError::InvalidKubeconfig(format!("Error parsing kubeconfig: {}", e))
    })
}

/// Write a kubeconfig atomically: temp file in the same directory, then rename
pub fn write_kubeconfig(kubeconfig: &Kubeconfig, path: &Path) -> WarnetResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let yaml = serde_yaml::to_string(kubeconfig)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(yaml.as_bytes())?;
    temp.flush()?;
    temp.persist(path).map_err(|e| {
        WarnetError::InvalidKubeconfig(format!(
            "Error writing kubeconfig {}: {}",
            path.display(),
            e.error
        ))
    })?;

    Ok(())
}

/// Cluster entry referenced by the current context
pub fn cluster_of_current_context(kubeconfig: &Kubeconfig) -> WarnetResult<NamedCluster> {
    let context_name = kubeconfig
        .current_context
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            WarnetError::InvalidKubeconfig("No current context found in kubeconfig.".into())
        })?;

    let context = kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == context_name)
        .ok_or_else(|| {
            WarnetError::InvalidKubeconfig(format!(
                "Context '{}' not found in kubeconfig.",
                context_name
            ))
        })?;

    let cluster_name = context
        .context
        .as_ref()
        .map(|c| c.cluster.as_str())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            WarnetError::InvalidKubeconfig(format!(
                "Cluster not specified in context '{}'.",
                context_name
            ))
        })?;

    kubeconfig
        .clusters
        .iter()
        .find(|c| c.name == cluster_name)
        .cloned()
        .ok_or_else(|| {
            WarnetError::InvalidKubeconfig(format!(
                "Cluster '{}' not found in kubeconfig.",
                cluster_name
            ))
        })
}

/// Namespace pinned on the current context, if any
pub fn namespace_of_current_context(kubeconfig: &Kubeconfig) -> Option<String> {
    let current = kubeconfig.current_context.as_deref()?;
    kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == current)
        .and_then(|c| c.context.as_ref())
        .and_then(|c| c.namespace.clone())
        .filter(|ns| !ns.is_empty())
}

/// Pin `namespace` on the current context
pub fn set_namespace_of_current_context(
    kubeconfig: &mut Kubeconfig,
    namespace: &str,
) -> WarnetResult<()> {
    let current = kubeconfig
        .current_context
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            WarnetError::InvalidKubeconfig("No current context found in kubeconfig.".into())
        })?;

    let context = kubeconfig
        .contexts
        .iter_mut()
        .find(|c| c.name == current)
        .and_then(|c| c.context.as_mut())
        .ok_or_else(|| {
            WarnetError::InvalidKubeconfig(format!("Context '{}' not found in kubeconfig.", current))
        })?;
    context.namespace = Some(namespace.to_string());
    Ok(())
}
