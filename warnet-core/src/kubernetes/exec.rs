//! Kubernetes exec operations
//!
//! Run commands inside tank containers, push files into them and pull
//! directories out of them as tar streams.

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams, AttachedProcess};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::client::K8sClient;
use crate::error::{WarnetError, WarnetResult};

/// Output from an exec command
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (0 for success)
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout on success, an exec error carrying stderr otherwise
    pub fn into_stdout(self, what: &str) -> WarnetResult<String> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(WarnetError::Exec(format!(
                "{} exited with {}: {}",
                what,
                self.exit_code,
                self.stderr.trim()
            )))
        }
    }
}

/// Exit code carried by the exec status channel
pub fn exit_code_from_status(status: &Status) -> i32 {
    if status.status.as_deref() == Some("Success") {
        return 0;
    }
    status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .and_then(|c| c.message.as_ref())
                .and_then(|m| m.trim().parse().ok())
        })
        .unwrap_or(1)
}

async fn finish(mut attached: AttachedProcess, what: &str) -> WarnetResult<i32> {
    let status = attached
        .take_status()
        .ok_or_else(|| WarnetError::Exec(format!("{}: no status channel", what)))?
        .await;
    attached
        .join()
        .await
        .map_err(|e| WarnetError::Exec(format!("{}: {}", what, e)))?;

    Ok(status.as_ref().map(exit_code_from_status).unwrap_or(1))
}

async fn read_all<R: tokio::io::AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Execute a command in a container, returning raw stdout bytes with stderr and exit code
pub async fn exec_bytes(
    client: &K8sClient,
    pod_name: &str,
    container: Option<&str>,
    command: &[String],
    namespace: Option<&str>,
) -> WarnetResult<(Vec<u8>, String, i32)> {
    let pods: Api<Pod> = Api::namespaced(client.inner().clone(), client.namespace_or(namespace));

    let mut params = AttachParams::default().stdin(false).stdout(true).stderr(true);
    if let Some(c) = container {
        params = params.container(c);
    }

    let mut attached = pods.exec(pod_name, command.to_vec(), &params).await?;
    let (stdout, stderr) = tokio::join!(read_all(attached.stdout()), read_all(attached.stderr()));
    let exit_code = finish(attached, pod_name).await?;

    Ok((stdout?, String::from_utf8_lossy(&stderr?).to_string(), exit_code))
}

/// Execute a command in a container and return the output
pub async fn exec_command(
    client: &K8sClient,
    pod_name: &str,
    container: Option<&str>,
    command: &[String],
    namespace: Option<&str>,
) -> WarnetResult<ExecOutput> {
    tracing::debug!("exec in {}: {}", pod_name, command.join(" "));
    let (stdout, stderr, exit_code) =
        exec_bytes(client, pod_name, container, command, namespace).await?;

    Ok(ExecOutput {
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr,
        exit_code,
    })
}

/// Write `data` to `dst_path` inside a container.
///
/// Data lands in `<dst_path>.tmp` first and is renamed once synced, so
/// readers never observe a partial file.
pub async fn write_file_to_container(
    client: &K8sClient,
    pod_name: &str,
    container: &str,
    dst_path: &str,
    data: &[u8],
    namespace: Option<&str>,
) -> WarnetResult<()> {
    let pods: Api<Pod> = Api::namespaced(client.inner().clone(), client.namespace_or(namespace));
    let params = AttachParams::default()
        .container(container)
        .stdin(true)
        .stdout(true)
        .stderr(true);

    let write_cmd = vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("cat > {}.tmp && sync", dst_path),
    ];
    let mut attached = pods.exec(pod_name, write_cmd, &params).await?;
    let mut stdin = attached
        .stdin()
        .ok_or_else(|| WarnetError::Exec(format!("{}: stdin not attached", pod_name)))?;
    stdin.write_all(data).await?;
    stdin.shutdown().await?;
    drop(stdin);

    let code = finish(attached, pod_name).await?;
    if code != 0 {
        return Err(WarnetError::Exec(format!(
            "Failed to copy data to {}({}):{}",
            pod_name, container, dst_path
        )));
    }

    let rename = vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("mv {0}.tmp {0}", dst_path),
    ];
    exec_command(client, pod_name, Some(container), &rename, namespace)
        .await?
        .into_stdout("mv")?;

    tracing::info!("Copied data to {}({}):{}", pod_name, container, dst_path);
    Ok(())
}

/// Name of the item at `source_path` and the `tar` argv that streams it out.
///
/// A bare name is taken relative to `/`.
pub fn download_command(source_path: &Path) -> WarnetResult<(String, Vec<String>)> {
    let parent = source_path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string());
    let item = source_path
        .file_name()
        .ok_or_else(|| WarnetError::Validation(format!("Nothing to download at {}", source_path.display())))?
        .to_string_lossy()
        .into_owned();

    let command = vec![
        "tar".to_string(),
        "cf".to_string(),
        "-".to_string(),
        "-C".to_string(),
        parent,
        item.clone(),
    ];
    Ok((item, command))
}

/// Download `source_path` from a pod into `destination`.
///
/// The item is streamed out with `tar cf -` and unpacked locally, so
/// directories keep their structure. Returns the local path of the item.
pub async fn download(
    client: &K8sClient,
    pod_name: &str,
    source_path: &Path,
    destination: &Path,
    namespace: Option<&str>,
) -> WarnetResult<PathBuf> {
    let (item, command) = download_command(source_path)?;
    let (archive, stderr, code) = exec_bytes(client, pod_name, None, &command, namespace).await?;
    if code != 0 {
        return Err(WarnetError::Exec(format!("tar in {} failed: {}", pod_name, stderr.trim())));
    }

    std::fs::create_dir_all(destination)?;
    tar::Archive::new(std::io::Cursor::new(archive)).unpack(destination)?;

    Ok(destination.join(item))
}

/// `find` invocation selecting what a datadir snapshot contains
pub fn snapshot_find_command(chain: &str, filters: &[String]) -> Vec<String> {
    let root = format!("/root/.bitcoin/{}", chain);
    let mut command: Vec<String> = vec!["find".into(), root];
    if let Some((first, rest)) = filters.split_first() {
        command.extend(
            ["(", "-type", "f", "-o", "-type", "d", ")", "(", "-name"]
                .iter()
                .map(|s| s.to_string()),
        );
        command.push(first.clone());
        for f in rest {
            command.extend(["-o".to_string(), "-name".to_string(), f.clone()]);
        }
        command.push(")".into());
    }
    command
}

/// Paths relative to the chain directory, ready for `tar -C`
pub fn snapshot_relative_paths(chain: &str, find_output: &str) -> Vec<String> {
    let root = format!("/root/.bitcoin/{}", chain);
    find_output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| {
            let rel = l.strip_prefix(&root)?.trim_start_matches('/');
            Some(if rel.is_empty() { ".".to_string() } else { rel.to_string() })
        })
        .collect()
}

/// Archive (part of) a tank's datadir into `<local_dir>/<pod>_bitcoin_data.tar.gz`
pub async fn snapshot_bitcoin_datadir(
    client: &K8sClient,
    pod_name: &str,
    chain: &str,
    local_dir: &Path,
    filters: &[String],
    namespace: Option<&str>,
) -> WarnetResult<PathBuf> {
    const REMOTE_ARCHIVE: &str = "/tmp/bitcoin_data.tar.gz";

    let found = exec_command(client, pod_name, None, &snapshot_find_command(chain, filters), namespace)
        .await?
        .into_stdout("find")?;
    let files = snapshot_relative_paths(chain, &found);
    if files.is_empty() {
        return Err(WarnetError::Validation(
            "No matching files or directories found.".to_string(),
        ));
    }

    let mut tar_cmd: Vec<String> = vec![
        "tar".into(),
        "-czf".into(),
        REMOTE_ARCHIVE.into(),
        "-C".into(),
        format!("/root/.bitcoin/{}", chain),
    ];
    tar_cmd.extend(files);
    exec_command(client, pod_name, None, &tar_cmd, namespace)
        .await?
        .into_stdout("tar")?;

    let cat = vec!["cat".to_string(), REMOTE_ARCHIVE.to_string()];
    let (bytes, stderr, code) = exec_bytes(client, pod_name, None, &cat, namespace).await?;
    if code != 0 {
        return Err(WarnetError::Exec(format!(
            "Failed to copy archive out of {}: {}",
            pod_name,
            stderr.trim()
        )));
    }

    std::fs::create_dir_all(local_dir)?;
    let local_file = local_dir.join(format!("{}_bitcoin_data.tar.gz", pod_name));
    tokio::fs::write(&local_file, bytes).await?;

    let cleanup = vec!["rm".to_string(), REMOTE_ARCHIVE.to_string()];
    if let Err(e) = exec_command(client, pod_name, None, &cleanup, namespace).await {
        tracing::warn!("Could not remove {} in {}: {}", REMOTE_ARCHIVE, pod_name, e);
    }

    tracing::info!("Bitcoin data exported successfully to {}", local_file.display());
    Ok(local_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{StatusCause, StatusDetails};

    #[test]
    fn test_exit_code_from_status() {
        let ok = Status {
            status: Some("Success".to_string()),
            ..Default::default()
        };
        assert_eq!(exit_code_from_status(&ok), 0);

        let failed = Status {
            status: Some("Failure".to_string()),
            reason: Some("NonZeroExitCode".to_string()),
            details: Some(StatusDetails {
                causes: Some(vec![StatusCause {
                    reason: Some("ExitCode".to_string()),
                    message: Some("7".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(exit_code_from_status(&failed), 7);

        assert_eq!(exit_code_from_status(&Status::default()), 1);
    }

    #[test]
    fn test_snapshot_find_command_without_filters() {
        assert_eq!(
            snapshot_find_command("regtest", &[]),
            vec!["find", "/root/.bitcoin/regtest"]
        );
    }

    #[test]
    fn test_snapshot_find_command_with_filters() {
        let filters = vec!["blocks".to_string(), "chainstate".to_string()];
        let cmd = snapshot_find_command("signet", &filters);
        assert_eq!(
            cmd.join(" "),
            "find /root/.bitcoin/signet ( -type f -o -type d ) ( -name blocks -o -name chainstate )"
        );
    }

    #[test]
    fn test_download_command() {
        let (item, command) = download_command(Path::new("/root/.bitcoin/regtest/debug.log")).unwrap();
        assert_eq!(item, "debug.log");
        assert_eq!(command, ["tar", "cf", "-", "-C", "/root/.bitcoin/regtest", "debug.log"]);

        let (item, command) = download_command(Path::new("shared")).unwrap();
        assert_eq!(item, "shared");
        assert_eq!(command[4], "/");

        assert!(matches!(
            download_command(Path::new("/")),
            Err(WarnetError::Validation(_))
        ));
        assert!(download_command(Path::new("/root/..")).is_err());
    }

    #[test]
    fn test_snapshot_relative_paths() {
        let out = "/root/.bitcoin/regtest\n/root/.bitcoin/regtest/blocks\n\n/root/.bitcoin/regtest/blocks/blk00000.dat\n";
        assert_eq!(
            snapshot_relative_paths("regtest", out),
            vec![".", "blocks", "blocks/blk00000.dat"]
        );
    }

    #[test]
    fn test_exec_output_into_stdout() {
        let ok = ExecOutput {
            stdout: "42\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert_eq!(ok.into_stdout("getblockcount").unwrap(), "42\n");

        let failed = ExecOutput {
            stdout: String::new(),
            stderr: "error code: -32601\n".to_string(),
            exit_code: 1,
        };
        let err = failed.into_stdout("bitcoin-cli").unwrap_err();
        assert!(err.to_string().contains("-32601"));
    }
}
