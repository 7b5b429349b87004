use anyhow::{bail, Result};
use regex::Regex;

use super::types::{ScriptSpec, YamlConfig, YamlScriptConfig};
use crate::provision::{DeletionPolicy, ProvisionRequest};

/// Environment variable consulted when neither a script nor the settings name a project.
pub const PROJECT_ENV: &str = "SQLPROV_PROJECT";

/// Validate the entire configuration for correctness.
pub fn validate(config: &YamlConfig) -> Result<()> {
    validate_settings(config)?;

    let instance_re = Regex::new(r"^[a-z][a-z0-9-]*$")?;
    let mut errors = Vec::new();
    for (address, script) in &config.project.scripts {
        errors.extend(validate_script(address, script, &instance_re));
    }

    if !errors.is_empty() {
        bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(())
}

fn validate_settings(config: &YamlConfig) -> Result<()> {
    let settings = &config.project.settings;
    if settings.parallelism == 0 {
        bail!("settings.parallelism must be at least 1");
    }
    if settings.retry.base_delay_ms == 0 || settings.retry.max_delay_ms == 0 {
        bail!("settings.retry delays must be greater than zero");
    }
    if settings.retry.base_delay_ms > settings.retry.max_delay_ms {
        bail!(
            "settings.retry.base_delay_ms ({}) exceeds max_delay_ms ({})",
            settings.retry.base_delay_ms,
            settings.retry.max_delay_ms
        );
    }
    if settings.timeouts.create_secs == 0 || settings.timeouts.read_secs == 0 {
        bail!("settings.timeouts must be greater than zero");
    }
    Ok(())
}

fn validate_script(address: &str, script: &YamlScriptConfig, instance_re: &Regex) -> Vec<String> {
    let mut errors = Vec::new();
    if script.name.trim().is_empty() {
        errors.push(format!("script '{}': name must not be empty", address));
    }
    if script.script.trim().is_empty() {
        errors.push(format!("script '{}': script must not be empty", address));
    }
    if !instance_re.is_match(&script.instance) {
        errors.push(format!(
            "script '{}': invalid instance name '{}'",
            address, script.instance
        ));
    }
    if let Err(e) = script.deletion_policy.parse::<DeletionPolicy>() {
        errors.push(format!("script '{}': {}", address, e));
    }
    errors
}

/// Blank values count as unset, so they fall through to the next source.
fn non_empty(project: Option<&str>) -> Option<&str> {
    project.filter(|p| !p.trim().is_empty())
}

/// Turn validated configuration into requests, resolving each script's project.
pub fn resolve_scripts(config: &YamlConfig, env_project: Option<&str>) -> Result<Vec<ScriptSpec>> {
    validate(config)?;

    let default_project = non_empty(config.project.settings.project.as_deref())
        .or_else(|| non_empty(env_project));

    let mut specs = Vec::new();
    for (address, script) in &config.project.scripts {
        let project = match non_empty(script.project.as_deref()).or(default_project) {
            Some(p) => p.to_string(),
            None => bail!(
                "script '{}': no project set. Set it on the script, in settings.project, or via {}",
                address,
                PROJECT_ENV
            ),
        };

        let deletion_policy = script
            .deletion_policy
            .parse::<DeletionPolicy>()
            .map_err(anyhow::Error::msg)?;
        let mut request = ProvisionRequest::new(&script.name, &script.instance, &script.script)
            .with_database(script.database.as_deref().unwrap_or(""));
        request.deletion_policy = deletion_policy;

        specs.push(ScriptSpec {
            address: address.clone(),
            project,
            request,
        });
    }
    Ok(specs)
}
