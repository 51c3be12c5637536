//! `warnet ln`

use anyhow::{Context as _, Result};
use serde::Serialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tabled::Tabled;
use warnet_common::constants::{BITCOIN_CHART, DEFAULT_NAMESPACE};
use warnet_core::chart::{render_lnd_configmaps, to_manifest, LndValues, ReleaseContext, TlsBundle};
use warnet_core::kubernetes::configmaps;

use super::Context;
use crate::output;
use crate::LnCommands;

#[derive(Tabled, Serialize)]
struct ChannelRow {
    source: String,
    target: String,
    id: String,
    local_amt: String,
    push_amt: String,
}

impl From<&serde_json::Value> for ChannelRow {
    fn from(c: &serde_json::Value) -> Self {
        let text = |key: &str| match &c[key] {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "-".to_string(),
            other => other.to_string(),
        };
        Self {
            source: text("source"),
            target: text("target"),
            id: format!("{}:{}", c["id"]["block"], c["id"]["index"]),
            local_amt: text("local_amt"),
            push_amt: text("push_amt"),
        }
    }
}

/// lnd subchart directory inside the charts tree
fn lnd_chart_dir(charts_dir: &Path) -> PathBuf {
    charts_dir.join(BITCOIN_CHART).join("charts").join("lnd")
}

/// An explicit chart dir must hold the pair; the configured tree may omit it
fn load_tls(chart_dir: Option<PathBuf>, charts_dir: &Path) -> Result<TlsBundle> {
    let (dir, bundle) = match chart_dir {
        Some(dir) => {
            let bundle = TlsBundle::load(&dir);
            (dir, bundle)
        }
        None => {
            let dir = lnd_chart_dir(charts_dir);
            let bundle = TlsBundle::load_or_embedded(&dir);
            (dir, bundle)
        }
    };
    bundle.with_context(|| format!("Cannot load TLS files from {}", dir.display()))
}

fn read_values(files: &[PathBuf]) -> Result<Vec<Value>> {
    files
        .iter()
        .map(|path| {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            serde_yaml::from_str(&raw).with_context(|| format!("Invalid YAML in {}", path.display()))
        })
        .collect()
}

pub async fn handle_ln_command(command: LnCommands, ctx: &Context) -> Result<()> {
    match command {
        LnCommands::Rpc { pod, method, params } => {
            let client = ctx.client().await?;
            let out = warnet_core::ln::rpc(&client, &pod, &method, &params, None).await?;
            println!("{}", out.trim_end());
        }

        LnCommands::Pubkey { pod } => {
            let client = ctx.client().await?;
            println!("{}", warnet_core::ln::pubkey(&client, &pod, None).await?);
        }

        LnCommands::Host { pod } => {
            let client = ctx.client().await?;
            println!("{}", warnet_core::ln::host(&client, &pod, None).await?);
        }

        LnCommands::Render {
            release,
            values,
            chart_dir,
            apply,
        } => {
            let overlays = read_values(&values)?;
            let lnd = LndValues::with_overlays(&overlays)?;
            let tls = load_tls(chart_dir, &ctx.charts_dir)?;

            if apply {
                let client = ctx.client().await?;
                let release = ReleaseContext::new(release, client.namespace());
                for cm in render_lnd_configmaps(&lnd, &release, &tls)?.into_vec() {
                    configmaps::apply_configmap(&client, &cm).await?;
                }
                output::print_success(&format!("Applied ConfigMaps for {}", release.lnd_fullname()));
            } else {
                let namespace = ctx.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
                let rendered = render_lnd_configmaps(&lnd, &ReleaseContext::new(release, namespace), &tls)?;
                print!("{}", to_manifest(&rendered.into_vec())?);
            }
        }

        LnCommands::Channels => {
            let client = ctx.client().await?;
            let channels = configmaps::get_channels(&client, None).await?;
            output::print_output(channels.iter().map(ChannelRow::from).collect(), ctx.output)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lnd_chart_dir() {
        assert_eq!(
            lnd_chart_dir(Path::new("resources/charts")),
            PathBuf::from("resources/charts/bitcoincore/charts/lnd")
        );
    }

    #[test]
    fn test_load_tls_defaults_only_for_the_charts_tree() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_tls(None, dir.path()).unwrap(), TlsBundle::embedded());
        assert!(load_tls(Some(dir.path().to_path_buf()), dir.path()).is_err());
    }

    #[test]
    fn test_read_values_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.yaml");
        let second = dir.path().join("b.yaml");
        std::fs::write(&first, "global:\n  chain: signet\n").unwrap();
        std::fs::write(&second, "global:\n  rpcpassword: hunter2\n").unwrap();

        let overlays = read_values(&[first, second]).unwrap();
        let lnd = LndValues::with_overlays(&overlays).unwrap();
        assert_eq!(lnd.global.chain, "signet");
        assert_eq!(lnd.global.rpcpassword, "hunter2");

        assert!(read_values(&[dir.path().join("missing.yaml")]).is_err());
    }

    #[test]
    fn test_channel_row() {
        let channel = serde_json::json!({
            "id": {"block": 300, "index": 1},
            "source": "tank-0000-ln",
            "target": "tank-0001-ln",
            "local_amt": 100000
        });
        let row = ChannelRow::from(&channel);
        assert_eq!(row.id, "300:1");
        assert_eq!(row.source, "tank-0000-ln");
        assert_eq!(row.local_amt, "100000");
        assert_eq!(row.push_amt, "-");
    }
}
