//! External program execution
//!
//! warnet shells out to `kubectl`, `helm` and `docker`. Programs are always
//! spawned with an argument vector, never through a shell.

use crate::error::{WarnetError, WarnetResult};
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Render a program and its arguments for log and error messages
pub fn display_command<S: AsRef<OsStr>>(program: &str, args: &[S]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Run a program to completion and return its stdout.
///
/// A non-zero exit turns into [`WarnetError::Command`] carrying stderr.
pub async fn run_command<S: AsRef<OsStr>>(program: &str, args: &[S]) -> WarnetResult<String> {
    let command = display_command(program, args);
    tracing::debug!("Running `{}`", command);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| WarnetError::Command {
            command: command.clone(),
            output: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(WarnetError::Command {
            command,
            output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run a program, echoing stdout and stderr lines as they arrive.
///
/// On failure the error carries everything the program printed.
pub async fn stream_command<S: AsRef<OsStr>>(program: &str, args: &[S]) -> WarnetResult<()> {
    let command = display_command(program, args);
    tracing::debug!("Streaming `{}`", command);

    let spawn_error = |e: std::io::Error| WarnetError::Command {
        command: command.clone(),
        output: e.to_string(),
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| WarnetError::Internal("child stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| WarnetError::Internal("child stderr not captured".to_string()))?;

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut message = String::new();
    let (mut stdout_open, mut stderr_open) = (true, true);

    while stdout_open || stderr_open {
        tokio::select! {
            line = stdout_lines.next_line(), if stdout_open => match line? {
                Some(line) => {
                    println!("{}", line);
                    message.push_str(&line);
                    message.push('\n');
                }
                None => stdout_open = false,
            },
            line = stderr_lines.next_line(), if stderr_open => match line? {
                Some(line) => {
                    eprintln!("{}", line);
                    message.push_str(&line);
                    message.push('\n');
                }
                None => stderr_open = false,
            },
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(WarnetError::Command {
            command,
            output: message.trim_end().to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        assert_eq!(
            display_command("helm", &["list", "--namespace", "warnet"]),
            "helm list --namespace warnet"
        );
        let empty: [&str; 0] = [];
        assert_eq!(display_command("kubectl", &empty), "kubectl");
    }

    #[tokio::test]
    async fn test_run_command_captures_stdout() {
        let out = run_command("sh", &["-c", "echo hello"]).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_command_failure_carries_stderr() {
        let err = run_command("sh", &["-c", "echo broken >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            WarnetError::Command { output, .. } => assert_eq!(output, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stream_command_failure_collects_output() {
        let err = stream_command("sh", &["-c", "echo out; echo err >&2; exit 1"])
            .await
            .unwrap_err();
        match err {
            WarnetError::Command { output, .. } => {
                assert!(output.contains("out"));
                assert!(output.contains("err"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        assert!(run_command("warnet-no-such-binary", &["--version"]).await.is_err());
    }
}
