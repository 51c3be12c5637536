//! lnd chart rendering
//!
//! Produces the two ConfigMaps the lnd chart ships next to every lightning
//! node: the node's `lnd.conf` with its TLS pair, and the channels ConfigMap
//! the scenario side reads back to open channels.

mod render;
mod values;

pub use render::{
    render_lnd_conf, render_lnd_configmaps, to_manifest, yaml_to_json, LndConfigMaps,
    ReleaseContext, TlsBundle,
};
pub use values::{merge_values, scalar_text, GlobalValues, LndValues, DEFAULT_LND_VALUES};
