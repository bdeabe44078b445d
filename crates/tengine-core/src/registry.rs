//! Capability registry.
//!
//! # Design
//!
//! - Definitions are validated once and indexed by exact `(source, target)` mimetype pair.
//! - Candidates for a pair are ordered by priority (higher first) then declaration order,
//!   so resolution is a deterministic first-fit scan.
//! - A pipeline declares its own end-to-end pairs; each step must be a command transformer
//!   that supports the mimetypes it is chained between. Intermediate mimetypes never leave
//!   the resolved plan.
//! - `NoMatch` keeps "no transformer for the pair" distinct from "transformer rejects the
//!   supplied options" so callers can report them differently.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A `(source, target)` mimetype pair a transformer supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedPair {
    /// Accepted source mimetype.
    pub source_media_type: String,
    /// Produced target mimetype.
    pub target_media_type: String,
    /// Largest source accepted for this pair; `None` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_source_size_bytes: Option<u64>,
}

impl SupportedPair {
    /// Pair with no size limit.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_media_type: source.into(),
            target_media_type: target.into(),
            max_source_size_bytes: None,
        }
    }

    fn accepts_size(&self, size: Option<u64>) -> bool {
        match (self.max_source_size_bytes, size) {
            (Some(max), Some(size)) => size <= max,
            _ => true,
        }
    }
}

/// How to invoke the external process backing a transformer.
///
/// Arguments may contain `{source}`, `{target}`, `{sourceMimetype}`, `{targetMimetype}`,
/// `{options}` and `{option:NAME}` placeholders; rendering lives in the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    /// Program to execute.
    pub program: String,
    /// Argument templates.
    #[serde(default)]
    pub args: Vec<String>,
}

/// One step of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Name of the command transformer run by this step.
    pub transformer: String,
    /// Mimetype produced by this step. Required for every step but the last, which
    /// defaults to the requested target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_media_type: Option<String>,
}

/// Declared capability of one transformer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformDefinition {
    /// Unique transformer name.
    pub name: String,
    /// Supported mimetype pairs.
    #[serde(default)]
    pub supported: Vec<SupportedPair>,
    /// Option names the transformer recognises.
    #[serde(default)]
    pub options: BTreeSet<String>,
    /// Steps when this definition is a pipeline.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<PipelineStep>,
    /// Tie-break among matching definitions; higher wins.
    #[serde(default)]
    pub priority: i32,
    /// Process invocation for command transformers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandTemplate>,
}

impl TransformDefinition {
    /// Whether this definition chains other transformers.
    #[must_use]
    pub fn is_pipeline(&self) -> bool {
        !self.pipeline.is_empty()
    }

    fn supports(&self, source: &str, target: &str) -> bool {
        self.supported
            .iter()
            .any(|pair| pair.source_media_type == source && pair.target_media_type == target)
    }
}

/// Lookup key for [`CapabilityIndex::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformQuery<'a> {
    /// Source mimetype.
    pub source_media_type: &'a str,
    /// Target mimetype.
    pub target_media_type: &'a str,
    /// Names of the options supplied with the request.
    pub option_names: Vec<&'a str>,
    /// Source size in bytes when known.
    pub source_size: Option<u64>,
}

/// Why a query could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoMatch {
    /// No transformer handles the pair.
    UnsupportedPair {
        /// Requested source mimetype.
        source_media_type: String,
        /// Requested target mimetype.
        target_media_type: String,
    },
    /// Transformers handle the pair, but none accepts a source this large.
    SourceTooLarge {
        /// Requested source mimetype.
        source_media_type: String,
        /// Requested target mimetype.
        target_media_type: String,
        /// Declared source size.
        source_size: u64,
    },
    /// Transformers handle the pair, but none recognises every supplied option.
    UnsupportedOptions {
        /// Requested source mimetype.
        source_media_type: String,
        /// Requested target mimetype.
        target_media_type: String,
        /// Option names that blocked the match.
        names: Vec<String>,
    },
}

impl fmt::Display for NoMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedPair {
                source_media_type,
                target_media_type,
            } => write!(f, "No transforms for: {source_media_type} -> {target_media_type}"),
            Self::SourceTooLarge {
                source_media_type,
                target_media_type,
                source_size,
            } => write!(
                f,
                "Source too large for: {source_media_type} -> {target_media_type} ({source_size} bytes)"
            ),
            Self::UnsupportedOptions {
                source_media_type,
                target_media_type,
                names,
            } => write!(
                f,
                "Unsupported transform options for: {source_media_type} -> {target_media_type}: {}",
                names.join(", ")
            ),
        }
    }
}

impl std::error::Error for NoMatch {}

/// One executable step of a resolved transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    /// Command transformer running this step.
    pub transformer: String,
    /// Mimetype the step reads.
    pub source_media_type: String,
    /// Mimetype the step writes.
    pub target_media_type: String,
    /// Option names forwarded to this step.
    pub options: BTreeSet<String>,
    /// Process invocation.
    pub command: CommandTemplate,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransform {
    /// Name of the selected definition.
    pub name: String,
    /// Steps in execution order; a single entry for command transformers.
    pub steps: Vec<ResolvedStep>,
}

/// Serialisable view of one transformer for external routers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformerDescriptor {
    /// Transformer name.
    pub name: String,
    /// Supported pairs.
    pub supported: Vec<SupportedPair>,
    /// Recognised option names, including those inherited from pipeline steps.
    pub options: Vec<String>,
    /// Priority used for tie-breaks.
    pub priority: i32,
    /// Step transformer names for pipelines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<String>,
}

/// Capability snapshot served at `/transform/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    /// Engine identity.
    pub engine_name: String,
    /// Transformers in declaration order.
    pub transformers: Vec<TransformerDescriptor>,
}

#[derive(Debug, Clone)]
struct IndexedDefinition {
    definition: TransformDefinition,
    effective_options: BTreeSet<String>,
}

type PairKey = (String, String);

/// Read-only index answering "which transform handles this request".
#[derive(Debug, Clone)]
pub struct CapabilityIndex {
    entries: Vec<IndexedDefinition>,
    by_name: HashMap<String, usize>,
    by_pair: BTreeMap<PairKey, Vec<usize>>,
}

impl CapabilityIndex {
    /// Validate definitions and build the index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] when names are empty or repeated, a command transformer has no
    /// command, or a pipeline references unknown steps or does not chain.
    pub fn build(definitions: Vec<TransformDefinition>) -> CoreResult<Self> {
        let mut by_name = HashMap::with_capacity(definitions.len());
        for (idx, definition) in definitions.iter().enumerate() {
            if definition.name.trim().is_empty() {
                return Err(CoreError::InvalidDefinition {
                    transformer: definition.name.clone(),
                    field: "name",
                    reason: "must not be empty",
                    value: None,
                });
            }
            if by_name.insert(definition.name.clone(), idx).is_some() {
                return Err(CoreError::DuplicateTransformer {
                    name: definition.name.clone(),
                });
            }
        }

        let mut entries = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            let effective_options = validate_definition(definition, &definitions, &by_name)?;
            entries.push(IndexedDefinition {
                definition: definition.clone(),
                effective_options,
            });
        }

        let mut by_pair: BTreeMap<PairKey, Vec<usize>> = BTreeMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            for pair in &entry.definition.supported {
                let key = (
                    pair.source_media_type.clone(),
                    pair.target_media_type.clone(),
                );
                let slot = by_pair.entry(key).or_default();
                if !slot.contains(&idx) {
                    slot.push(idx);
                }
            }
        }
        for candidates in by_pair.values_mut() {
            // Stable sort keeps declaration order within equal priorities.
            candidates.sort_by_key(|idx| std::cmp::Reverse(entries[*idx].definition.priority));
        }

        Ok(Self {
            entries,
            by_name,
            by_pair,
        })
    }

    /// Number of indexed transformers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no transformers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definitions in declaration order.
    pub fn definitions(&self) -> impl Iterator<Item = &TransformDefinition> {
        self.entries.iter().map(|entry| &entry.definition)
    }

    /// Look up a definition by name.
    #[must_use]
    pub fn transformer(&self, name: &str) -> Option<&TransformDefinition> {
        self.by_name
            .get(name)
            .map(|idx| &self.entries[*idx].definition)
    }

    /// Resolve a query to the best matching transform.
    ///
    /// # Errors
    ///
    /// Returns [`NoMatch`] describing why no definition qualified.
    pub fn resolve(&self, query: &TransformQuery<'_>) -> Result<ResolvedTransform, NoMatch> {
        let key = (
            query.source_media_type.to_owned(),
            query.target_media_type.to_owned(),
        );
        let Some(candidates) = self.by_pair.get(&key) else {
            return Err(NoMatch::UnsupportedPair {
                source_media_type: key.0,
                target_media_type: key.1,
            });
        };

        let sized: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|idx| {
                self.entries[*idx].definition.supported.iter().any(|pair| {
                    pair.source_media_type == query.source_media_type
                        && pair.target_media_type == query.target_media_type
                        && pair.accepts_size(query.source_size)
                })
            })
            .collect();
        if sized.is_empty() {
            return Err(NoMatch::SourceTooLarge {
                source_media_type: key.0,
                target_media_type: key.1,
                source_size: query.source_size.unwrap_or_default(),
            });
        }

        let selected = sized.iter().copied().find(|idx| {
            let options = &self.entries[*idx].effective_options;
            query.option_names.iter().all(|name| options.contains(*name))
        });
        let Some(selected) = selected else {
            return Err(NoMatch::UnsupportedOptions {
                names: self.blocking_options(&sized, &query.option_names),
                source_media_type: key.0,
                target_media_type: key.1,
            });
        };

        Ok(self.plan(selected, query.source_media_type, query.target_media_type))
    }

    /// Capability snapshot for external routers.
    #[must_use]
    pub fn descriptor(&self, engine_name: &str) -> CapabilityDescriptor {
        let transformers = self
            .entries
            .iter()
            .map(|entry| TransformerDescriptor {
                name: entry.definition.name.clone(),
                supported: entry.definition.supported.clone(),
                options: entry.effective_options.iter().cloned().collect(),
                priority: entry.definition.priority,
                pipeline: entry
                    .definition
                    .pipeline
                    .iter()
                    .map(|step| step.transformer.clone())
                    .collect(),
            })
            .collect();
        CapabilityDescriptor {
            engine_name: engine_name.to_owned(),
            transformers,
        }
    }

    fn blocking_options(&self, candidates: &[usize], names: &[&str]) -> Vec<String> {
        let known: BTreeSet<&str> = candidates
            .iter()
            .flat_map(|idx| self.entries[*idx].effective_options.iter())
            .map(String::as_str)
            .collect();
        let mut unknown: BTreeSet<String> = names
            .iter()
            .filter(|name| !known.contains(**name))
            .map(|name| (*name).to_owned())
            .collect();
        if unknown.is_empty()
            && let Some(first) = candidates.first()
        {
            let options = &self.entries[*first].effective_options;
            unknown = names
                .iter()
                .filter(|name| !options.contains(**name))
                .map(|name| (*name).to_owned())
                .collect();
        }
        unknown.into_iter().collect()
    }

    fn plan(&self, idx: usize, source: &str, target: &str) -> ResolvedTransform {
        let definition = &self.entries[idx].definition;
        if !definition.is_pipeline() {
            return ResolvedTransform {
                name: definition.name.clone(),
                steps: vec![self.step(idx, source, target)],
            };
        }

        let mut steps = Vec::with_capacity(definition.pipeline.len());
        let mut current = source.to_owned();
        let last = definition.pipeline.len() - 1;
        for (position, step) in definition.pipeline.iter().enumerate() {
            let next = if position == last {
                target.to_owned()
            } else {
                step.target_media_type.clone().unwrap_or_default()
            };
            // Validated at build time; every step names an indexed command transformer.
            if let Some(step_idx) = self.by_name.get(&step.transformer) {
                let mut resolved = self.step(*step_idx, &current, &next);
                // Options declared on the pipeline itself reach every step.
                resolved.options.extend(definition.options.iter().cloned());
                steps.push(resolved);
            }
            current = next;
        }
        ResolvedTransform {
            name: definition.name.clone(),
            steps,
        }
    }

    fn step(&self, idx: usize, source: &str, target: &str) -> ResolvedStep {
        let entry = &self.entries[idx];
        ResolvedStep {
            transformer: entry.definition.name.clone(),
            source_media_type: source.to_owned(),
            target_media_type: target.to_owned(),
            options: entry.effective_options.clone(),
            command: entry.definition.command.clone().unwrap_or_else(|| CommandTemplate {
                program: String::new(),
                args: Vec::new(),
            }),
        }
    }
}

fn validate_definition(
    definition: &TransformDefinition,
    all: &[TransformDefinition],
    by_name: &HashMap<String, usize>,
) -> CoreResult<BTreeSet<String>> {
    if definition.supported.is_empty() {
        return Err(CoreError::InvalidDefinition {
            transformer: definition.name.clone(),
            field: "supported",
            reason: "must declare at least one pair",
            value: None,
        });
    }

    if !definition.is_pipeline() {
        return match &definition.command {
            Some(command) if !command.program.trim().is_empty() => Ok(definition.options.clone()),
            Some(command) => Err(CoreError::InvalidDefinition {
                transformer: definition.name.clone(),
                field: "command.program",
                reason: "must not be empty",
                value: Some(command.program.clone()),
            }),
            None => Err(CoreError::InvalidDefinition {
                transformer: definition.name.clone(),
                field: "command",
                reason: "required for command transformers",
                value: None,
            }),
        };
    }

    if definition.command.is_some() {
        return Err(CoreError::InvalidDefinition {
            transformer: definition.name.clone(),
            field: "command",
            reason: "not allowed on pipelines",
            value: None,
        });
    }

    let mut effective = definition.options.clone();
    let mut step_definitions = Vec::with_capacity(definition.pipeline.len());
    for step in &definition.pipeline {
        let step_definition = by_name
            .get(&step.transformer)
            .map(|idx| &all[*idx])
            .filter(|candidate| !candidate.is_pipeline())
            .ok_or_else(|| CoreError::UnknownPipelineStep {
                transformer: definition.name.clone(),
                step: step.transformer.clone(),
            })?;
        effective.extend(step_definition.options.iter().cloned());
        step_definitions.push(step_definition);
    }

    let last = definition.pipeline.len() - 1;
    for pair in &definition.supported {
        let mut current = pair.source_media_type.as_str();
        for (position, (step, step_definition)) in definition
            .pipeline
            .iter()
            .zip(step_definitions.iter())
            .enumerate()
        {
            let next = match (&step.target_media_type, position == last) {
                (Some(declared), true) if declared != &pair.target_media_type => {
                    return Err(chain_mismatch(definition, position, current, declared));
                }
                (_, true) => pair.target_media_type.as_str(),
                (Some(declared), false) => declared.as_str(),
                (None, false) => {
                    return Err(CoreError::InvalidDefinition {
                        transformer: definition.name.clone(),
                        field: "pipeline.target_media_type",
                        reason: "required for intermediate steps",
                        value: Some(step.transformer.clone()),
                    });
                }
            };
            if !step_definition.supports(current, next) {
                return Err(chain_mismatch(definition, position, current, next));
            }
            current = next;
        }
    }

    Ok(effective)
}

fn chain_mismatch(
    definition: &TransformDefinition,
    step_index: usize,
    source: &str,
    target: &str,
) -> CoreError {
    CoreError::PipelineChainMismatch {
        transformer: definition.name.clone(),
        step_index,
        source_media_type: source.to_owned(),
        target_media_type: target.to_owned(),
    }
}
