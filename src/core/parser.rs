//! Phase file parsing and validation.
//!
//! Parses phase.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Phase name and targets must be well-formed identifiers
//! - Every action has a known flavor and an argument list
//! - Every call references a declared action with matching arity
//! - Script placeholders reference declared parameters
//! - Extra `meta` keys do not shadow reserved metadata keys

use super::action::{ActionMeta, ACTION_NAME, ALWAYS_AFTER, ALWAYS_BEFORE, DOC};
use super::define::{define_action, ActionDecl, DefinedAction, Flavor};
use super::error::DefinitionError;
use super::template;
use super::types::{is_identifier, Args, Policy, TargetId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// Schema
// ============================================================================

/// Root of a phase file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseFile {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Phase name
    pub phase: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Targets the phase body runs against ("origin" for the controlling host)
    pub targets: Vec<TargetId>,

    /// Linearization policy
    #[serde(default)]
    pub policy: Policy,

    /// Named action definitions (order-preserving)
    #[serde(default)]
    pub actions: IndexMap<String, ActionSpec>,

    /// Ordered phase body
    #[serde(default)]
    pub body: Vec<Step>,
}

/// A declared action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    /// bash | function | aggregated | collected
    pub flavor: String,

    /// Argument names; required, may be empty
    #[serde(default)]
    pub params: Option<Vec<String>>,

    #[serde(default)]
    pub doc: Option<String>,

    /// Payload template with `{{args.NAME}}` placeholders
    #[serde(default)]
    pub script: Option<String>,

    #[serde(default)]
    pub always_before: Vec<String>,

    #[serde(default)]
    pub always_after: Vec<String>,

    /// Extra text metadata
    #[serde(default)]
    pub meta: IndexMap<String, String>,
}

/// One entry of a phase body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Call {
        call: String,
        #[serde(default)]
        args: Args,
    },
    Scope {
        scope: Vec<Step>,
    },
    Precedence {
        precedence: PrecedenceStep,
    },
}

/// Steps run with extra ambient precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecedenceStep {
    #[serde(default)]
    pub always_before: Vec<String>,

    #[serde(default)]
    pub always_after: Vec<String>,

    #[serde(default)]
    pub body: Vec<Step>,
}

// ============================================================================
// Parsing
// ============================================================================

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a phase file from disk.
pub fn parse_phase_file(path: &Path) -> Result<PhaseFile, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_phase(&content)
}

/// Parse a phase file from a string.
pub fn parse_phase(yaml: &str) -> Result<PhaseFile, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Metadata keys set by the definition itself; a `meta` map may not use them.
const RESERVED_META_KEYS: [&str; 4] = [ACTION_NAME, DOC, ALWAYS_BEFORE, ALWAYS_AFTER];

/// Validate a parsed phase file. Returns a list of errors (empty = valid).
pub fn validate_phase(file: &PhaseFile) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut err = |message: String| errors.push(ValidationError { message });

    if file.version != "1.0" {
        err(format!("version must be \"1.0\", got \"{}\"", file.version));
    }
    if !is_identifier(&file.phase) {
        err(format!("invalid phase name {:?}", file.phase));
    }
    if file.targets.is_empty() {
        err("phase has no targets".to_string());
    }
    let mut seen_targets = HashSet::new();
    for target in &file.targets {
        if !target.is_valid() {
            err(format!("invalid target name {:?}", target.to_string()));
        }
        if !seen_targets.insert(target) {
            err(format!("target '{}' listed twice", target));
        }
    }

    for (name, spec) in &file.actions {
        if !is_identifier(name) {
            err(format!("invalid action name {:?}", name));
        }
        if let Err(e) = spec.flavor.parse::<Flavor>() {
            err(format!("action '{}': {}", name, e));
        }
        match &spec.params {
            None => err(format!("action '{}' has no params list", name)),
            Some(params) => {
                let mut seen = HashSet::new();
                for p in params {
                    if !seen.insert(p) {
                        err(format!("action '{}' declares parameter '{}' twice", name, p));
                    }
                }
                if let Some(script) = &spec.script {
                    for used in template::referenced_args(script) {
                        if !params.contains(&used) {
                            err(format!(
                                "action '{}' script references undeclared argument '{}'",
                                name, used
                            ));
                        }
                    }
                }
            }
        }
        for id in spec.always_before.iter().chain(&spec.always_after) {
            if !is_identifier(id) {
                err(format!("action '{}' has invalid precedence reference {:?}", name, id));
            }
        }
        for key in spec.meta.keys() {
            if RESERVED_META_KEYS.contains(&key.as_str()) {
                err(format!("action '{}' meta key '{}' is reserved", name, key));
            }
        }
    }

    validate_steps(file, &file.body, &mut err);
    errors
}

fn validate_steps(file: &PhaseFile, steps: &[Step], err: &mut impl FnMut(String)) {
    for step in steps {
        match step {
            Step::Call { call, args } => match file.actions.get(call) {
                None => err(format!("call to unknown action '{}'", call)),
                Some(spec) => {
                    if let Some(params) = &spec.params {
                        if params.len() != args.len() {
                            err(format!(
                                "call to '{}' passes {} argument(s), expected {}",
                                call,
                                args.len(),
                                params.len()
                            ));
                        }
                    }
                }
            },
            Step::Scope { scope } => validate_steps(file, scope, err),
            Step::Precedence { precedence } => {
                for id in precedence.always_before.iter().chain(&precedence.always_after) {
                    if !is_identifier(id) {
                        err(format!("invalid precedence reference {:?}", id));
                    }
                }
                validate_steps(file, &precedence.body, err);
            }
        }
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Turn the file's action specs into defined actions.
pub fn build_actions(file: &PhaseFile) -> Result<IndexMap<String, DefinedAction>, DefinitionError> {
    let mut actions = IndexMap::new();
    for (name, spec) in &file.actions {
        actions.insert(name.clone(), build_action(name, spec)?);
    }
    Ok(actions)
}

fn build_action(name: &str, spec: &ActionSpec) -> Result<DefinedAction, DefinitionError> {
    let flavor: Flavor = spec.flavor.parse()?;

    // Extra entries go in first so declared doc and relations take precedence
    let mut extra = ActionMeta::new();
    for (k, v) in &spec.meta {
        extra = extra.text(k.clone(), v.clone());
    }
    let mut decl = ActionDecl::new(name).meta(extra);
    if let Some(params) = &spec.params {
        decl = decl.params(params.iter().cloned());
    }
    if let Some(doc) = &spec.doc {
        decl = decl.doc(doc.clone());
    }
    if !spec.always_before.is_empty() {
        decl = decl.relation(ALWAYS_BEFORE, spec.always_before.iter().map(String::as_str));
    }
    if !spec.always_after.is_empty() {
        decl = decl.relation(ALWAYS_AFTER, spec.always_after.iter().map(String::as_str));
    }

    let params = spec.params.clone().unwrap_or_default();
    let script = spec.script.clone();
    let label = name.to_string();
    define_action(flavor, decl, move |args: &[serde_json::Value]| match &script {
        Some(t) => template::render(t, &params, args),
        None => {
            let mut parts = vec![label.clone()];
            parts.extend(args.iter().map(template::value_to_string));
            Ok(parts.join(" "))
        }
    })
}
