//! Descriptor loading and environment overrides.
//!
//! # Design
//! - The descriptor is JSON; every non-identity setting has a default.
//! - Overrides read through a lookup closure so tests never mutate the process env.
//! - The loaded configuration is validated before it is returned.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tengine_core::CapabilityIndex;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::EngineConfig;
use crate::validate::validate;

/// Environment variable naming the descriptor path.
pub const CONFIG_PATH_ENV: &str = "TENGINE_CONFIG";

/// Load the descriptor named by [`CONFIG_PATH_ENV`] and apply process env overrides.
///
/// # Errors
///
/// Returns [`ConfigError`] when the variable is unset, the descriptor cannot be read or
/// parsed, an override is malformed, or validation fails.
pub fn load_from_env() -> ConfigResult<(EngineConfig, CapabilityIndex)> {
    let lookup = |name: &str| std::env::var(name).ok();
    let path = lookup(CONFIG_PATH_ENV).ok_or(ConfigError::MissingEnv {
        name: CONFIG_PATH_ENV,
    })?;
    load_from_path(Path::new(&path), lookup)
}

/// Load a descriptor from disk, apply overrides from `lookup`, and validate.
///
/// # Errors
///
/// See [`load_from_env`].
pub fn load_from_path<F>(path: &Path, lookup: F) -> ConfigResult<(EngineConfig, CapabilityIndex)>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "descriptor.read",
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: EngineConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
    debug!(
        path = %path.display(),
        transformers = config.transformers.len(),
        "loaded engine descriptor"
    );
    apply_overrides(&mut config, lookup)?;
    let index = validate(&config)?;
    Ok((config, index))
}

/// Parse a descriptor from a string without overrides or validation.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed JSON.
pub fn parse_descriptor(raw: &str) -> ConfigResult<EngineConfig> {
    serde_json::from_str(raw).map_err(|source| ConfigError::Parse { path: None, source })
}

/// Apply `TENGINE_*` overrides resolved through `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when an override cannot be parsed.
pub fn apply_overrides<F>(config: &mut EngineConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("TENGINE_HTTP_ADDR") {
        config.http.bind_addr = parse::<SocketAddr>(&value, "http", "bind_addr")?;
    }
    if let Some(value) = lookup("TENGINE_WORK_DIR") {
        config.work_dir = PathBuf::from(value);
    }
    if let Some(value) = lookup("TENGINE_STORE_DIR") {
        config.store_dir = PathBuf::from(value);
    }
    if let Some(value) = lookup("TENGINE_QUEUE_ENABLED") {
        config.queue.enabled = parse_flag(&value, "queue", "enabled")?;
    }
    if let Some(value) = lookup("TENGINE_REQUEST_QUEUE") {
        config.queue.request_queue = value;
    }
    if let Some(value) = lookup("TENGINE_QUEUE_CONCURRENCY") {
        config.queue.concurrency = parse(&value, "queue", "concurrency")?;
    }
    if let Some(value) = lookup("TENGINE_DEFAULT_TIMEOUT_MS") {
        config.transform.default_timeout_ms = parse(&value, "transform", "default_timeout_ms")?;
    }
    if let Some(value) = lookup("TENGINE_PROBE_TOLERANCE_PERCENT") {
        config.probe.tolerance_percent = parse(&value, "probe", "tolerance_percent")?;
    }
    if let Some(value) = lookup("TENGINE_PROBE_RAMP_UP") {
        config.probe.ramp_up = parse(&value, "probe", "ramp_up")?;
    }
    if let Some(value) = lookup("TENGINE_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Some(value) = lookup("TENGINE_LOG_FORMAT") {
        config.logging.format = Some(value);
    }
    Ok(())
}

fn parse<T: FromStr>(value: &str, section: &'static str, field: &'static str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(section, field, Some(value.to_owned()), "unparseable"))
}

fn parse_flag(value: &str, section: &'static str, field: &'static str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_owned()),
            "not_a_boolean",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::error::Error;

    const DESCRIPTOR: &str = r#"{
        "engine_name": "misc",
        "transformers": [
            {
                "name": "text-copy",
                "supported": [
                    {"source_media_type": "text/plain", "target_media_type": "text/plain"}
                ],
                "options": ["pageLimit"],
                "command": {"program": "/bin/cp", "args": ["{source}", "{target}"]}
            }
        ]
    }"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn descriptor_defaults_fill_missing_sections() -> Result<(), Box<dyn Error>> {
        let config = parse_descriptor(DESCRIPTOR)?;
        assert_eq!(config.engine_name, "misc");
        assert_eq!(config.queue.concurrency, 4);
        assert_eq!(config.transform.default_timeout_ms, 120_000);
        assert_eq!(config.probe.tolerance_percent, 110);
        assert_eq!(config.probe.ramp_up, 5);
        assert_eq!(config.http.bind_addr.port(), 8090);
        assert_eq!(config.queue.request_queue, "tengine.requests");
        Ok(())
    }

    #[test]
    fn overrides_replace_descriptor_values() -> Result<(), Box<dyn Error>> {
        let mut config = parse_descriptor(DESCRIPTOR)?;
        apply_overrides(
            &mut config,
            env(&[
                ("TENGINE_HTTP_ADDR", "127.0.0.1:9000"),
                ("TENGINE_QUEUE_CONCURRENCY", "8"),
                ("TENGINE_QUEUE_ENABLED", "yes"),
                ("TENGINE_DEFAULT_TIMEOUT_MS", "500"),
                ("TENGINE_LOG_FORMAT", "json"),
            ]),
        )?;
        assert_eq!(config.http.bind_addr.port(), 9000);
        assert_eq!(config.queue.concurrency, 8);
        assert!(config.queue.enabled);
        assert_eq!(config.transform.default_timeout_ms, 500);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        Ok(())
    }

    #[test]
    fn malformed_override_names_the_field() -> Result<(), Box<dyn Error>> {
        let mut config = parse_descriptor(DESCRIPTOR)?;
        let err = apply_overrides(&mut config, env(&[("TENGINE_PROBE_RAMP_UP", "many")]));
        assert!(matches!(
            err,
            Err(ConfigError::InvalidField {
                section: "probe",
                field: "ramp_up",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn load_from_path_validates_and_indexes() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("engine.json");
        std::fs::write(&path, DESCRIPTOR)?;

        let (config, index) = load_from_path(&path, env(&[]))?;
        assert_eq!(config.engine_name, "misc");
        assert!(index.transformer("text-copy").is_some());

        let missing = load_from_path(&dir.path().join("absent.json"), env(&[]));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
        Ok(())
    }
}
