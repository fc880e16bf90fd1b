use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::model::{PolicySnapshot, PolicySource, OPAQUE_PATHS};

const ENV_PREFIX: &str = "SLOTPILOT_POLICY__";
const ENV_JSON: &str = "SLOTPILOT_POLICY_OVERRIDE_JSON";
const ENV_CLI_OVERRIDES: &str = "SLOTPILOT_POLICY_CLI_OVERRIDES";

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
    pub include_cli_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
            include_cli_env: true,
        }
    }
}

/// Builtin defaults, then the file, then `SLOTPILOT_POLICY__*`, then CLI overrides.
pub fn load_snapshot(path: Option<&Path>) -> Result<PolicySnapshot, PolicyError> {
    let mut options = LoadOptions::default();
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    options.include_env = true;
    options.include_cli_env = true;
    load_snapshot_with_options(&options)
}

pub fn load_snapshot_with_options(options: &LoadOptions) -> Result<PolicySnapshot, PolicyError> {
    let mut snapshot = default_snapshot();
    bootstrap_builtin_provenance(&mut snapshot)?;

    for path in &options.paths {
        if path.exists() {
            let overlay = overlays_from_file(path)?;
            apply_overlays(&mut snapshot, overlay)?;
        } else {
            debug!(path = %path.display(), "policy file not found, skipping");
        }
    }

    if options.include_env {
        let env_overlays = overlays_from_env()?;
        apply_overlays(&mut snapshot, env_overlays)?;
    }

    if options.include_cli_env {
        let cli_overlays = overlays_from_cli_env();
        apply_overlays(&mut snapshot, cli_overlays)?;
    }

    Ok(snapshot)
}

struct PolicyOverlay {
    path: String,
    value: Value,
    source: PolicySource,
}

fn apply_overlays(
    snapshot: &mut PolicySnapshot,
    overlays: Vec<PolicyOverlay>,
) -> Result<(), PolicyError> {
    for overlay in overlays {
        debug!(path = %overlay.path, source = ?overlay.source, "policy overlay");
        snapshot.apply_override(&overlay.path, &overlay.value, overlay.source)?;
    }
    Ok(())
}

fn overlays_from_file(path: &Path) -> Result<Vec<PolicyOverlay>, PolicyError> {
    let content = fs::read_to_string(path).map_err(|err| PolicyError::Io(format!("{}", err)))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    Ok(flatten_value(json_value, None, PolicySource::File))
}

fn overlays_from_env() -> Result<Vec<PolicyOverlay>, PolicyError> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                continue;
            }
            overlays.push(PolicyOverlay {
                path,
                value: parse_env_value(&raw),
                source: PolicySource::Env,
            });
        }
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
            overlays.extend(flatten_value(json_value, None, PolicySource::Env));
        }
    }

    Ok(overlays)
}

/// `path=value` pairs separated by commas.
fn overlays_from_cli_env() -> Vec<PolicyOverlay> {
    let Ok(raw) = env::var(ENV_CLI_OVERRIDES) else {
        return Vec::new();
    };
    raw.split(',')
        .filter_map(|token| {
            let (path, value_raw) = match token.trim().split_once('=') {
                Some((path, value)) => (path.trim(), value.trim()),
                None => (token.trim(), ""),
            };
            (!path.is_empty()).then(|| PolicyOverlay {
                path: path.to_string(),
                value: parse_env_value(value_raw),
                source: PolicySource::Cli,
            })
        })
        .collect()
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

/// Objects are walked down to their leaves; arrays and the opaque paths stay whole.
fn flatten_value(value: Value, prefix: Option<String>, source: PolicySource) -> Vec<PolicyOverlay> {
    let opaque = prefix
        .as_deref()
        .is_some_and(|path| OPAQUE_PATHS.contains(&path));
    match value {
        Value::Object(map) if !opaque => {
            let mut result = Vec::new();
            for (key, value) in map {
                let key_segment = key.trim().to_ascii_lowercase();
                let next_prefix = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{}.{}", prefix, key_segment),
                    _ => key_segment,
                };
                result.extend(flatten_value(value, Some(next_prefix), source));
            }
            result
        }
        other => match prefix {
            Some(path) => vec![PolicyOverlay {
                path,
                value: other,
                source,
            }],
            None => Vec::new(),
        },
    }
}

fn bootstrap_builtin_provenance(snapshot: &mut PolicySnapshot) -> Result<(), PolicyError> {
    let sections = [
        ("click", serde_json::to_value(&snapshot.click)),
        ("form", serde_json::to_value(&snapshot.form)),
        ("sequencer", serde_json::to_value(&snapshot.sequencer)),
        ("landing", serde_json::to_value(&snapshot.landing)),
    ];
    let mut overlays = Vec::new();
    for (name, value) in sections {
        let value = value.map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
        overlays.extend(flatten_value(value, Some(name.into()), PolicySource::Builtin));
    }

    for overlay in overlays {
        snapshot.set_provenance(&overlay.path, overlay.source);
    }
    Ok(())
}
