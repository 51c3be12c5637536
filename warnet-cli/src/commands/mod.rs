//! Command handlers

pub mod bitcoin;
pub mod image;
pub mod ln;
pub mod namespaces;
pub mod network;
pub mod project;
pub mod scenario;
pub mod setup;
pub mod snapshot;

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use warnet_core::helm::Helm;
use warnet_core::kubernetes::K8sClient;

use crate::config::Config;
use crate::output::OutputFormat;
use crate::Cli;

/// Settings every handler shares, flags layered over the config file
#[derive(Debug, Clone)]
pub struct Context {
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub charts_dir: PathBuf,
    pub output: OutputFormat,
}

impl Context {
    pub fn new(cli: &Cli, config: &Config) -> Self {
        Self {
            namespace: cli.namespace.clone().or_else(|| config.namespace.clone()),
            kubeconfig: cli.kubeconfig.clone().or_else(|| config.kubeconfig.clone()),
            charts_dir: config.charts_dir.clone(),
            output: OutputFormat::from_name(cli.output.as_deref().unwrap_or(&config.default_output)),
        }
    }

    /// Cluster client; without an explicit namespace the kubeconfig context decides
    pub async fn client(&self) -> Result<K8sClient> {
        K8sClient::connect(self.kubeconfig.as_deref(), self.namespace.as_deref())
            .await
            .context("Could not connect to the cluster")
    }

    pub fn helm(&self) -> Helm {
        Helm::new(self.kubeconfig.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            namespace: Some("from-config".to_string()),
            default_output: "yaml".to_string(),
            ..Default::default()
        };

        let cli = Cli::parse_from(["warnet", "status"]);
        let ctx = Context::new(&cli, &config);
        assert_eq!(ctx.namespace.as_deref(), Some("from-config"));
        assert_eq!(ctx.output, OutputFormat::Yaml);
        assert_eq!(ctx.charts_dir, PathBuf::from("resources/charts"));

        let cli = Cli::parse_from(["warnet", "-n", "red", "-o", "json", "--kubeconfig", "/k", "status"]);
        let ctx = Context::new(&cli, &config);
        assert_eq!(ctx.namespace.as_deref(), Some("red"));
        assert_eq!(ctx.output, OutputFormat::Json);
        assert_eq!(ctx.kubeconfig, Some(PathBuf::from("/k")));
    }
}
