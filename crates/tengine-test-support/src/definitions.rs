//! Builders for capability definitions.

use std::collections::BTreeSet;

use tengine_core::{CommandTemplate, PipelineStep, SupportedPair, TransformDefinition};

/// Command transformer supporting `pairs` and recognising `options`.
#[must_use]
pub fn command_definition(
    name: &str,
    command: CommandTemplate,
    pairs: &[(&str, &str)],
    options: &[&str],
) -> TransformDefinition {
    TransformDefinition {
        name: name.to_owned(),
        supported: pairs
            .iter()
            .map(|(source, target)| SupportedPair::new(*source, *target))
            .collect(),
        options: options.iter().map(|option| (*option).to_owned()).collect(),
        pipeline: Vec::new(),
        priority: 0,
        command: Some(command),
    }
}

/// Pipeline over `steps`, given as `(transformer, produced mimetype)`; the last step's
/// mimetype may be `None`.
#[must_use]
pub fn pipeline_definition(
    name: &str,
    pair: (&str, &str),
    steps: &[(&str, Option<&str>)],
) -> TransformDefinition {
    TransformDefinition {
        name: name.to_owned(),
        supported: vec![SupportedPair::new(pair.0, pair.1)],
        options: BTreeSet::new(),
        pipeline: steps
            .iter()
            .map(|(transformer, target)| PipelineStep {
                transformer: (*transformer).to_owned(),
                target_media_type: target.map(str::to_owned),
            })
            .collect(),
        priority: 0,
        command: None,
    }
}
