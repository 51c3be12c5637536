//! `warnet init` and `warnet new`

use anyhow::{Context as _, Result};
use std::path::Path;
use warnet_core::project;

use crate::output;

pub fn handle_init() -> Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine the current directory")?;
    project::init_project(&cwd)?;
    output::print_success(&format!("Initialized warnet project in {}", cwd.display()));
    Ok(())
}

pub fn handle_new(directory: &Path) -> Result<()> {
    project::new_project(directory)
        .with_context(|| format!("Cannot create project {}", directory.display()))?;
    output::print_success(&format!("Created warnet project in {}", directory.display()));
    Ok(())
}
