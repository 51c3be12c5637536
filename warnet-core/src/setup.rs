//! Environment checks behind `warnet setup`

use serde::Serialize;
use std::path::Path;

use crate::kubernetes::{namespaces, K8sClient};
use crate::process::run_command;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SetupCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl SetupCheck {
    pub fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}

pub fn all_passed(checks: &[SetupCheck]) -> bool {
    checks.iter().all(|c| c.passed)
}

/// First non-empty line of a version banner
fn first_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

async fn check_program(name: &str, args: &[&str]) -> SetupCheck {
    match run_command(name, args).await {
        Ok(out) => SetupCheck::pass(name, first_line(&out)),
        Err(e) => SetupCheck::fail(name, format!("{} is not usable: {}", name, e)),
    }
}

/// Run every check; a failing check never stops the ones after it
pub async fn run_checks(kubeconfig: Option<&Path>, namespace: Option<&str>) -> Vec<SetupCheck> {
    let mut checks = vec![
        check_program("kubectl", &["version", "--client"]).await,
        check_program("helm", &["version", "--short"]).await,
    ];

    let client = match K8sClient::connect(kubeconfig, namespace).await {
        Ok(client) => client,
        Err(e) => {
            checks.push(SetupCheck::fail("cluster", e.to_string()));
            return checks;
        }
    };

    match client.health_check().await {
        Ok(version) => checks.push(SetupCheck::pass(
            "cluster",
            format!("{} at {}", version, client.api_server()),
        )),
        Err(e) => {
            checks.push(SetupCheck::fail("cluster", e.to_string()));
            return checks;
        }
    }

    checks.push(match namespaces::can_delete_pods(&client, None).await {
        Ok(true) => SetupCheck::pass("permissions", format!("can manage pods in {}", client.namespace())),
        Ok(false) => SetupCheck::fail(
            "permissions",
            format!("not allowed to delete pods in {}", client.namespace()),
        ),
        Err(e) => SetupCheck::fail("permissions", e.to_string()),
    });

    checks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("\n  v3.14.2+g1234\nextra"), "v3.14.2+g1234");
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn test_all_passed() {
        let mut checks = vec![SetupCheck::pass("helm", "v3"), SetupCheck::pass("kubectl", "v1.30")];
        assert!(all_passed(&checks));
        checks.push(SetupCheck::fail("cluster", "connection refused"));
        assert!(!all_passed(&checks));
    }

    #[tokio::test]
    async fn test_missing_program_fails_check() {
        let check = check_program("warnet-no-such-binary", &["--version"]).await;
        assert!(!check.passed);
        assert_eq!(check.name, "warnet-no-such-binary");
    }
}
