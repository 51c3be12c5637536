//! Project scaffolding for `warnet init` and `warnet new`
//!
//! A project is a directory holding `networks/`, `plugins/` and
//! `scenarios/`. The default content is compiled into the binary.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use warnet_common::constants::{NETWORK_DIR, PLUGINS_DIR, SCENARIOS_DIR};

use crate::error::{WarnetError, WarnetResult};

/// A file compiled into the binary, path relative to its defaults root
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedFile {
    pub path: &'static str,
    pub contents: &'static str,
}

macro_rules! embedded {
    ($root:literal, [$($path:literal),* $(,)?]) => {
        &[$(EmbeddedFile {
            path: $path,
            contents: include_str!(concat!("../resources/", $root, "/", $path)),
        }),*]
    };
}

pub const NETWORK_DEFAULTS: &[EmbeddedFile] = embedded!(
    "networks",
    [
        "6_node_bitcoin/network.yaml",
        "6_node_bitcoin/node-defaults.yaml",
        "lightning/network.yaml",
        "lightning/node-defaults.yaml",
    ]
);

pub const PLUGIN_DEFAULTS: &[EmbeddedFile] = embedded!("plugins", ["README.md"]);

pub const SCENARIO_DEFAULTS: &[EmbeddedFile] = embedded!("scenarios", ["README.md", "miner_std.py"]);

/// Where default content comes from
#[derive(Debug, Clone)]
pub enum DefaultsSource {
    Embedded(&'static [EmbeddedFile]),
    Dir(PathBuf),
}

/// Shell-style name match supporting `*` and `?`
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    fn inner(name: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => name.is_empty(),
            Some(('*', rest)) => (0..=name.len()).any(|i| inner(&name[i..], rest)),
            Some(('?', rest)) => !name.is_empty() && inner(&name[1..], rest),
            Some((c, rest)) => name.first() == Some(c) && inner(&name[1..], rest),
        }
    }
    let name: Vec<char> = name.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    inner(&name, &pattern)
}

fn is_excluded(name: &str, exclude: &[&str]) -> bool {
    exclude.iter().any(|p| matches_pattern(name, p))
}

/// Copy a defaults tree into `directory/target_subdir`.
///
/// Entries whose file name matches an exclude pattern are skipped, along
/// with everything below them. Existing files are overwritten.
pub fn copy_defaults(
    directory: &Path,
    target_subdir: &str,
    source: &DefaultsSource,
    exclude: &[&str],
) -> WarnetResult<PathBuf> {
    let target_dir = directory.join(target_subdir);
    fs::create_dir_all(&target_dir)?;
    tracing::info!("Creating directory: {}", target_dir.display());

    match source {
        DefaultsSource::Embedded(files) => {
            for file in files.iter() {
                let rel = Path::new(file.path);
                let skipped = rel
                    .components()
                    .any(|c| is_excluded(&c.as_os_str().to_string_lossy(), exclude));
                if skipped {
                    continue;
                }
                let dst = target_dir.join(rel);
                if let Some(parent) = dst.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&dst, file.contents)?;
            }
        }
        DefaultsSource::Dir(src) => {
            let walker = WalkDir::new(src)
                .min_depth(1)
                .into_iter()
                .filter_entry(|e| !is_excluded(&e.file_name().to_string_lossy(), exclude));
            for entry in walker {
                let entry = entry.map_err(|e| WarnetError::Io(e.into()))?;
                let rel = entry
                    .path()
                    .strip_prefix(src)
                    .map_err(|e| WarnetError::Internal(e.to_string()))?;
                let dst = target_dir.join(rel);
                if entry.file_type().is_dir() {
                    fs::create_dir_all(&dst)?;
                } else {
                    fs::copy(entry.path(), &dst)?;
                }
            }
        }
    }

    tracing::info!("Finished copying files to {}", target_dir.display());
    Ok(target_dir)
}

pub fn copy_network_defaults(directory: &Path) -> WarnetResult<PathBuf> {
    copy_defaults(
        directory,
        NETWORK_DIR,
        &DefaultsSource::Embedded(NETWORK_DEFAULTS),
        &["__pycache__", "__init__.py"],
    )
}

pub fn copy_scenario_defaults(directory: &Path) -> WarnetResult<PathBuf> {
    copy_defaults(
        directory,
        SCENARIOS_DIR,
        &DefaultsSource::Embedded(SCENARIO_DEFAULTS),
        &["__pycache__", "test_scenarios"],
    )
}

pub fn copy_plugins_defaults(directory: &Path) -> WarnetResult<PathBuf> {
    copy_defaults(
        directory,
        PLUGINS_DIR,
        &DefaultsSource::Embedded(PLUGIN_DEFAULTS),
        &["__pycache__", "__init__"],
    )
}

/// Populate an existing directory with the default project layout
pub fn init_project(directory: &Path) -> WarnetResult<()> {
    if !directory.is_dir() {
        return Err(WarnetError::Validation(format!(
            "{} is not a directory",
            directory.display()
        )));
    }
    copy_network_defaults(directory)?;
    copy_scenario_defaults(directory)?;
    copy_plugins_defaults(directory)?;
    tracing::info!("Initialized warnet project in {}", directory.display());
    Ok(())
}

/// Create a new project directory; it must not exist yet
pub fn new_project(directory: &Path) -> WarnetResult<()> {
    if directory.exists() {
        return Err(WarnetError::AlreadyExists(directory.display().to_string()));
    }
    fs::create_dir_all(directory)?;
    init_project(directory)
}
