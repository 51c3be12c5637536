//! Helm release operations
//!
//! Drives the helm CLI. Values are handed over through a temporary values
//! file and release listings are read with `--output json`.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::error::{WarnetError, WarnetResult};

/// Helm release as reported by `helm list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelmRelease {
    pub name: String,
    pub namespace: String,
    pub chart: String,
    pub chart_version: String,
    pub app_version: Option<String>,
    pub status: String,
    pub revision: i32,
    pub updated: String,
}

/// Helm list output item
#[derive(Debug, Deserialize)]
struct HelmListItem {
    name: String,
    namespace: String,
    revision: String,
    updated: String,
    status: String,
    chart: String,
    #[serde(default)]
    app_version: String,
}

impl From<HelmListItem> for HelmRelease {
    fn from(item: HelmListItem) -> Self {
        // Chart column is "name-version"
        let (chart, chart_version) = match item.chart.rfind('-') {
            Some(idx) => (item.chart[..idx].to_string(), item.chart[idx + 1..].to_string()),
            None => (item.chart.clone(), String::new()),
        };

        HelmRelease {
            name: item.name,
            namespace: item.namespace,
            chart,
            chart_version,
            app_version: if item.app_version.is_empty() {
                None
            } else {
                Some(item.app_version)
            },
            status: item.status,
            revision: item.revision.parse().unwrap_or(0),
            updated: item.updated,
        }
    }
}

/// Parse the JSON printed by `helm list --output json`
pub fn parse_release_list(raw: &[u8]) -> WarnetResult<Vec<HelmRelease>> {
    let trimmed = String::from_utf8_lossy(raw);
    if trimmed.trim().is_empty() || trimmed.trim() == "null" {
        return Ok(Vec::new());
    }
    let items: Vec<HelmListItem> = serde_json::from_slice(raw)
        .map_err(|e| WarnetError::Helm(format!("Failed to parse helm output: {}", e)))?;
    Ok(items.into_iter().map(HelmRelease::from).collect())
}

/// An `upgrade --install` invocation
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub release: String,
    pub chart: PathBuf,
    pub namespace: String,
    pub values: Option<serde_json::Value>,
    pub wait: bool,
    pub timeout: Option<String>,
    pub create_namespace: bool,
}

impl InstallRequest {
    pub fn new(release: impl Into<String>, chart: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            chart: chart.into(),
            namespace: namespace.into(),
            values: None,
            wait: false,
            timeout: None,
            create_namespace: false,
        }
    }

    pub fn with_values(mut self, values: serde_json::Value) -> Self {
        self.values = Some(values);
        self
    }

    pub fn wait(mut self, timeout: Option<String>) -> Self {
        self.wait = true;
        self.timeout = timeout;
        self
    }

    /// Argument vector for `helm`, given where the values file was written
    pub fn args(&self, values_file: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            self.release.clone(),
            self.chart.to_string_lossy().into_owned(),
            "--namespace".to_string(),
            self.namespace.clone(),
        ];
        if self.create_namespace {
            args.push("--create-namespace".to_string());
        }
        if self.wait {
            args.push("--wait".to_string());
        }
        if let Some(timeout) = &self.timeout {
            args.push("--timeout".to_string());
            args.push(timeout.clone());
        }
        if let Some(path) = values_file {
            args.push("--values".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        args
    }
}

/// helm CLI bound to one kubeconfig
#[derive(Debug, Clone, Default)]
pub struct Helm {
    kubeconfig: Option<PathBuf>,
}

impl Helm {
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self { kubeconfig }
    }

    async fn run(&self, args: &[String], what: &str) -> WarnetResult<Vec<u8>> {
        let mut cmd = Command::new("helm");
        cmd.args(args);
        if let Some(path) = &self.kubeconfig {
            cmd.env("KUBECONFIG", path);
        }
        tracing::debug!("helm {}", args.join(" "));

        let output = cmd
            .output()
            .await
            .map_err(|e| WarnetError::Helm(format!("Failed to run helm: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WarnetError::Helm(format!("helm {} failed: {}", what, stderr.trim())));
        }
        Ok(output.stdout)
    }

    /// Install a release, or upgrade it in place when it already exists
    pub async fn upgrade_install(&self, request: &InstallRequest) -> WarnetResult<()> {
        // Held until helm returns
        let values_file = match &request.values {
            Some(values) => {
                let mut file = tempfile::Builder::new()
                    .prefix("warnet-values-")
                    .suffix(".json")
                    .tempfile()?;
                file.write_all(serde_json::to_string(values)?.as_bytes())?;
                file.flush()?;
                Some(file)
            }
            None => None,
        };

        let args = request.args(values_file.as_ref().map(|f| f.path()));
        self.run(&args, "upgrade").await?;
        tracing::info!(
            "Installed release {} ({}) in {}",
            request.release,
            request.chart.display(),
            request.namespace
        );
        Ok(())
    }

    /// Uninstall a release
    pub async fn uninstall(&self, release: &str, namespace: &str) -> WarnetResult<()> {
        let args = vec![
            "uninstall".to_string(),
            release.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ];
        self.run(&args, "uninstall").await?;
        tracing::info!("Uninstalled release {} from {}", release, namespace);
        Ok(())
    }

    /// List releases in one namespace
    pub async fn list_releases(&self, namespace: &str) -> WarnetResult<Vec<HelmRelease>> {
        let args = vec![
            "list".to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        parse_release_list(&self.run(&args, "list").await?)
    }
}
