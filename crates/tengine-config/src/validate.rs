//! Validation of a loaded configuration.

use tengine_core::{CapabilityIndex, TransformQuery};

use crate::error::{ConfigError, ConfigResult};
use crate::model::EngineConfig;

/// Validate tunables and build the capability index.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for out-of-range settings or an unresolvable
/// probe transform, and [`ConfigError::Capability`] for broken transformer definitions.
pub fn validate(config: &EngineConfig) -> ConfigResult<CapabilityIndex> {
    if config.engine_name.trim().is_empty() {
        return Err(ConfigError::invalid("engine", "engine_name", None, "empty"));
    }
    if config.queue.concurrency == 0 {
        return Err(ConfigError::invalid(
            "queue",
            "concurrency",
            Some("0".into()),
            "must_be_positive",
        ));
    }
    if config.queue.enabled && config.queue.request_queue.trim().is_empty() {
        return Err(ConfigError::invalid("queue", "request_queue", None, "empty"));
    }
    if config.transform.default_timeout_ms == 0 {
        return Err(ConfigError::invalid(
            "transform",
            "default_timeout_ms",
            Some("0".into()),
            "must_be_positive",
        ));
    }
    if config.probe.ramp_up == 0 {
        return Err(ConfigError::invalid(
            "probe",
            "ramp_up",
            Some("0".into()),
            "must_be_positive",
        ));
    }
    if let Some(format) = &config.logging.format
        && !matches!(format.as_str(), "pretty" | "json")
    {
        return Err(ConfigError::invalid(
            "logging",
            "format",
            Some(format.clone()),
            "unknown_format",
        ));
    }

    let index = CapabilityIndex::build(config.transformers.clone())
        .map_err(|source| ConfigError::Capability { source })?;

    if let Some(test) = &config.probe.test {
        let query = TransformQuery {
            source_media_type: &test.source_media_type,
            target_media_type: &test.target_media_type,
            option_names: test.options.keys().map(String::as_str).collect(),
            source_size: None,
        };
        if index.resolve(&query).is_err() {
            return Err(ConfigError::invalid(
                "probe",
                "test",
                Some(format!(
                    "{} -> {}",
                    test.source_media_type, test.target_media_type
                )),
                "unresolvable",
            ));
        }
    }

    Ok(index)
}
