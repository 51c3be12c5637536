//! `warnet bitcoin`

use anyhow::{bail, Result};
use serde::Serialize;
use std::time::Duration;
use tabled::Tabled;
use warnet_core::network::{self, ClusterPeers, ConnectivityReport, TankConnectivity};

use super::network::CONNECT_POLL_INTERVAL;
use super::Context;
use crate::output;
use crate::BitcoinCommands;

#[derive(Tabled, Serialize)]
struct ConnectivityRow {
    tank: String,
    expected: usize,
    actual: usize,
    connected: String,
}

impl From<&TankConnectivity> for ConnectivityRow {
    fn from(t: &TankConnectivity) -> Self {
        Self {
            tank: t.tank.clone(),
            expected: t.expected,
            actual: t.actual,
            connected: output::yes_no(t.is_connected()),
        }
    }
}

pub async fn handle_bitcoin_command(command: BitcoinCommands, ctx: &Context) -> Result<()> {
    let client = ctx.client().await?;

    match command {
        BitcoinCommands::Rpc { tank, method, params } => {
            let out = warnet_core::bitcoin::rpc(&client, &tank, &method, &params, None).await?;
            println!("{}", out.trim_end());
        }

        BitcoinCommands::Connected { wait } => {
            let source = ClusterPeers::new(&client);
            let report: ConnectivityReport = match wait {
                Some(secs) => {
                    network::wait_for_connected(&source, Duration::from_secs(secs), CONNECT_POLL_INTERVAL)
                        .await?
                }
                None => network::check_connected(&source).await?,
            };

            for tank in report.tanks.iter().filter(|t| t.error.is_some()) {
                output::print_warning(&format!(
                    "{}: {}",
                    tank.tank,
                    tank.error.as_deref().unwrap_or_default()
                ));
            }
            output::print_output(report.tanks.iter().map(ConnectivityRow::from).collect(), ctx.output)?;

            if !report.connected() {
                bail!("Network is not connected");
            }
            output::print_success("Network connected");
        }
    }

    Ok(())
}
