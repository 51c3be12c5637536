//! Custom Bitcoin Core images built with docker buildx

use serde::Serialize;
use std::path::PathBuf;

use crate::error::{WarnetError, WarnetResult};
use crate::process::stream_command;

pub const ARCHES: &[&str] = &["amd64", "arm64", "armhf"];
pub const BUILDER_NAME: &str = "bitcoind-builder";

/// Configure flags used when none are given
pub const DEFAULT_BUILD_ARGS: &str = "--disable-tests --without-gui --disable-bench --disable-fuzz-binary --enable-suppress-external-warnings --disable-dependency-tracking ";

/// `--load` into the local docker, or `--push` to the registry
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildAction {
    Load,
    Push,
}

impl std::str::FromStr for BuildAction {
    type Err = WarnetError;

    fn from_str(s: &str) -> WarnetResult<Self> {
        match s {
            "load" => Ok(Self::Load),
            "push" => Ok(Self::Push),
            other => Err(WarnetError::Validation(format!("unknown build action '{}'", other))),
        }
    }
}

impl BuildAction {
    fn flag(&self) -> &'static str {
        match self {
            Self::Load => "--load",
            Self::Push => "--push",
        }
    }
}

/// A validated image build
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub repo: String,
    pub commit_sha: String,
    pub registry: String,
    pub tags: Vec<String>,
    pub build_args: String,
    pub arches: Vec<String>,
    pub action: BuildAction,
    pub dockerfile: PathBuf,
}

impl BuildPlan {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: &str,
        commit_sha: &str,
        registry: &str,
        tags: &str,
        build_args: Option<&str>,
        arches: Option<&str>,
        action: BuildAction,
        dockerfile: PathBuf,
    ) -> WarnetResult<Self> {
        let arches: Vec<String> = match arches.filter(|a| !a.trim().is_empty()) {
            Some(list) => list.split(',').map(|a| a.trim().to_string()).collect(),
            None => vec!["amd64".to_string()],
        };
        if let Some(bad) = arches.iter().find(|a| !ARCHES.contains(&a.as_str())) {
            return Err(WarnetError::Validation(format!(
                "{} is not a supported architecture",
                bad
            )));
        }

        let tags: Vec<String> = tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        if tags.is_empty() {
            return Err(WarnetError::Validation("at least one tag is required".to_string()));
        }

        Ok(Self {
            repo: repo.to_string(),
            commit_sha: commit_sha.to_string(),
            registry: registry.to_string(),
            tags,
            build_args: build_args
                .filter(|b| !b.is_empty())
                .unwrap_or(DEFAULT_BUILD_ARGS)
                .to_string(),
            arches,
            action,
            dockerfile,
        })
    }

    pub fn platforms(&self) -> String {
        self.arches
            .iter()
            .map(|a| format!("linux/{}", a))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Arguments for `docker`
    pub fn build_command(&self) -> Vec<String> {
        let context = self
            .dockerfile
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());

        let mut args: Vec<String> = vec![
            "buildx".into(),
            "build".into(),
            "--platform".into(),
            self.platforms(),
            "--build-arg".into(),
            format!("REPO={}", self.repo),
            "--build-arg".into(),
            format!("COMMIT_SHA={}", self.commit_sha),
            "--build-arg".into(),
            format!("BUILD_ARGS={}", self.build_args),
        ];
        for tag in &self.tags {
            args.push("--tag".into());
            args.push(tag.clone());
        }
        args.extend([
            "--file".into(),
            self.dockerfile.to_string_lossy().into_owned(),
            context,
            self.action.flag().into(),
        ]);
        args
    }

    /// Build with a dedicated buildx builder, removing it afterwards
    pub async fn execute(&self) -> WarnetResult<()> {
        tracing::info!(
            "Building {}@{} for {} (registry {})",
            self.repo,
            self.commit_sha,
            self.platforms(),
            self.registry
        );

        let created = stream_command("docker", &["buildx", "create", "--name", BUILDER_NAME, "--use"]).await;
        if created.is_err() {
            stream_command("docker", &["buildx", "use", "--builder", BUILDER_NAME])
                .await
                .map_err(|e| {
                    WarnetError::Internal(format!("Could not create or use builder {}: {}", BUILDER_NAME, e))
                })?;
        }

        let result = stream_command("docker", &self.build_command()).await;

        match stream_command("docker", &["buildx", "rm", BUILDER_NAME]).await {
            Ok(()) => tracing::info!("Buildx builder removed successfully."),
            Err(e) => tracing::warn!("Failed to remove the buildx builder: {}", e),
        }

        result
    }
}
