use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::types::YamlConfig;

/// Load sqlprov configuration from `path`.
///
/// A file is parsed on its own. A directory contributes every `*.yaml` and
/// `*.yml` file directly inside it, in file-name order: the first file names
/// the project and supplies settings, and all files add scripts.
pub fn load_config(path: &str) -> Result<YamlConfig> {
    let p = Path::new(path);

    if p.is_file() {
        return read_config_file(p);
    }
    if !p.is_dir() {
        bail!(
            "Config not found: '{}'. Pass a YAML file or a directory of YAML files with -c",
            path
        );
    }

    let files = script_files(p)?;
    let Some((first, rest)) = files.split_first() else {
        bail!("No .yaml files found in directory: {}", p.display());
    };
    tracing::info!(dir = %p.display(), files = files.len(), "Loading script configuration");

    let mut config = read_config_file(first)?;
    for file in rest {
        let extra = read_config_file(file)?;
        for (address, script) in extra.project.scripts {
            if config.project.scripts.contains_key(&address) {
                bail!(
                    "Duplicate script '{}' in {}. Script addresses must be unique.",
                    address,
                    file.display()
                );
            }
            config.project.scripts.insert(address, script);
        }
    }
    Ok(config)
}

/// YAML files directly inside `dir`, sorted.
fn script_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();
    files.sort();
    Ok(files)
}

fn read_config_file(path: &Path) -> Result<YamlConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config in {}", path.display()))
}

/// Parse one YAML document into a YamlConfig.
pub fn parse_config(content: &str) -> Result<YamlConfig> {
    serde_yaml::from_str(content).context("Failed to parse YAML configuration")
}
