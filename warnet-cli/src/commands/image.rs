//! `warnet image`

use anyhow::Result;
use warnet_core::image::{BuildAction, BuildPlan};

use crate::output;
use crate::ImageCommands;

pub async fn handle_image_command(command: ImageCommands) -> Result<()> {
    match command {
        ImageCommands::Build {
            repo,
            commit_sha,
            registry,
            tags,
            build_args,
            arches,
            action,
            dockerfile,
        } => {
            let action: BuildAction = action.parse()?;
            let plan = BuildPlan::new(
                &repo,
                &commit_sha,
                &registry,
                &tags,
                build_args.as_deref(),
                arches.as_deref(),
                action,
                dockerfile,
            )?;
            plan.execute().await?;
            output::print_success(&format!("Built {}", plan.tags.join(", ")));
        }
    }

    Ok(())
}
