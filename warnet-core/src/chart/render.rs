use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use warnet_common::constants::CHANNELS_LABEL;

use super::values::LndValues;
use crate::error::{WarnetError, WarnetResult};

pub const TLS_CERT_FILE: &str = "tls.cert";
pub const TLS_KEY_FILE: &str = "tls.key";

/// Pair used when the charts tree carries none
const DEFAULT_TLS_CERT: &str = include_str!("../../resources/tls/tls.cert");
const DEFAULT_TLS_KEY: &str = include_str!("../../resources/tls/tls.key");

/// Release the chart is rendered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseContext {
    pub release_name: String,
    pub namespace: String,
}

impl ReleaseContext {
    pub fn new(release_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            release_name: release_name.into(),
            namespace: namespace.into(),
        }
    }

    /// Full name of the lnd subchart objects
    pub fn lnd_fullname(&self) -> String {
        format!("{}-ln", self.release_name)
    }

    /// Service name of the tank's bitcoind
    pub fn bitcoind_host(&self) -> &str {
        &self.release_name
    }
}

/// PEM encoded TLS pair shipped with the lnd chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsBundle {
    pub cert: String,
    pub key: String,
}

fn is_pem(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.starts_with("-----BEGIN ")
        && trimmed.ends_with("-----")
        && trimmed.lines().any(|l| l.starts_with("-----END "))
}

impl TlsBundle {
    pub fn new(cert: impl Into<String>, key: impl Into<String>) -> WarnetResult<Self> {
        let (cert, key) = (cert.into(), key.into());
        if !is_pem(&cert) {
            return Err(WarnetError::InvalidPem(TLS_CERT_FILE.to_string()));
        }
        if !is_pem(&key) {
            return Err(WarnetError::InvalidPem(TLS_KEY_FILE.to_string()));
        }
        Ok(Self { cert, key })
    }

    /// Read `tls.cert` and `tls.key` from a chart directory
    pub fn load(dir: &Path) -> WarnetResult<Self> {
        let cert = fs::read_to_string(dir.join(TLS_CERT_FILE))?;
        let key = fs::read_to_string(dir.join(TLS_KEY_FILE))?;
        Self::new(cert, key)
    }

    /// The pair compiled into the binary
    pub fn embedded() -> Self {
        Self {
            cert: DEFAULT_TLS_CERT.to_string(),
            key: DEFAULT_TLS_KEY.to_string(),
        }
    }

    /// Load from `dir`, or the embedded pair when `dir` has neither file.
    ///
    /// A lone cert or key is still an error.
    pub fn load_or_embedded(dir: &Path) -> WarnetResult<Self> {
        if !dir.join(TLS_CERT_FILE).exists() && !dir.join(TLS_KEY_FILE).exists() {
            tracing::debug!("No TLS pair in {}, using the built-in one", dir.display());
            return Ok(Self::embedded());
        }
        Self::load(dir)
    }
}

/// Render the body of `lnd.conf`
pub fn render_lnd_conf(values: &LndValues, ctx: &ReleaseContext) -> WarnetResult<String> {
    let global = &values.global;
    let rpc_port = global.rpc_port()?;
    let host = ctx.bitcoind_host();
    let fullname = ctx.lnd_fullname();

    let mut conf = String::new();
    for block in [&values.base_config, &values.default_config, &values.config] {
        let block = block.trim_end();
        if !block.is_empty() {
            conf.push_str(block);
            conf.push('\n');
        }
    }

    let fixed = [
        format!("bitcoin.{}=1", global.chain),
        format!("bitcoind.rpcpass={}", global.rpcpassword),
        format!("bitcoind.rpchost={}:{}", host, rpc_port),
        format!("bitcoind.zmqpubrawblock=tcp://{}:{}", host, global.zmq_block_port),
        format!("bitcoind.zmqpubrawtx=tcp://{}:{}", host, global.zmq_tx_port),
        format!("alias={}", fullname),
        format!("externalhosts={}", fullname),
        format!("tlsextradomain={}", fullname),
    ];
    for line in fixed {
        conf.push_str(&line);
        conf.push('\n');
    }
    Ok(conf)
}

/// Convert a YAML value to JSON with object keys sorted.
///
/// Scalar mapping keys become their string form; NaN and infinities are
/// rejected since JSON can't carry them.
pub fn yaml_to_json(value: &YamlValue) -> WarnetResult<JsonValue> {
    Ok(match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(*b),
        YamlValue::Number(n) => {
            if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .ok_or_else(|| WarnetError::InvalidValues(format!("{} is not valid JSON", n)))?
            }
        }
        YamlValue::String(s) => JsonValue::String(s.clone()),
        YamlValue::Sequence(seq) => {
            JsonValue::Array(seq.iter().map(yaml_to_json).collect::<WarnetResult<_>>()?)
        }
        YamlValue::Mapping(mapping) => {
            let mut entries = BTreeMap::new();
            for (k, v) in mapping {
                entries.insert(mapping_key(k)?, yaml_to_json(v)?);
            }
            JsonValue::Object(entries.into_iter().collect::<Map<_, _>>())
        }
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value)?,
    })
}

fn mapping_key(key: &YamlValue) -> WarnetResult<String> {
    match key {
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        other => Err(WarnetError::InvalidValues(format!(
            "unsupported mapping key {:?}",
            other
        ))),
    }
}

fn with_trailing_newline(raw: &str) -> String {
    let mut out = raw.trim_end().to_string();
    out.push('\n');
    out
}

/// The pair of ConfigMaps rendered for one lnd node
#[derive(Debug, Clone)]
pub struct LndConfigMaps {
    pub config: ConfigMap,
    pub channels: ConfigMap,
}

impl LndConfigMaps {
    pub fn into_vec(self) -> Vec<ConfigMap> {
        vec![self.config, self.channels]
    }
}

/// Render the lnd config ConfigMap and its channels sibling
pub fn render_lnd_configmaps(
    values: &LndValues,
    ctx: &ReleaseContext,
    tls: &TlsBundle,
) -> WarnetResult<LndConfigMaps> {
    let fullname = ctx.lnd_fullname();

    let config = ConfigMap {
        metadata: ObjectMeta {
            name: Some(fullname.clone()),
            namespace: Some(ctx.namespace.clone()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([
            ("lnd.conf".to_string(), render_lnd_conf(values, ctx)?),
            (TLS_CERT_FILE.to_string(), with_trailing_newline(&tls.cert)),
            (TLS_KEY_FILE.to_string(), with_trailing_newline(&tls.key)),
        ])),
        ..Default::default()
    };

    let channels_json = serde_json::to_string(&yaml_to_json(&values.channels)?)?;
    let channels = ConfigMap {
        metadata: ObjectMeta {
            name: Some(format!("{}-channels", fullname)),
            namespace: Some(ctx.namespace.clone()),
            labels: Some(BTreeMap::from([(
                CHANNELS_LABEL.to_string(),
                "true".to_string(),
            )])),
            ..Default::default()
        },
        data: Some(BTreeMap::from([
            ("source".to_string(), fullname),
            ("channels".to_string(), channels_json),
        ])),
        ..Default::default()
    };

    Ok(LndConfigMaps { config, channels })
}

/// Multi-document YAML manifest, as `helm template` would print it
pub fn to_manifest(configmaps: &[ConfigMap]) -> WarnetResult<String> {
    let mut out = String::new();
    for cm in configmaps {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(cm)?);
    }
    Ok(out)
}
