//! Job domain model

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::result::JobResult;

/// Prefix of content-addressed locations understood by the stores
pub const STORE_URL_PREFIX: &str = "sha256://";

/// Execution specification of a single job
///
/// The specification is opaque to the orchestrator: it is only handed to a
/// job handler. The default handler runs `command` through `bash -c` with the
/// parameters, inputs and outputs exported as environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Human readable label (not part of the job signature)
    #[serde(default)]
    pub label: String,

    /// Shell command executed by the default handler
    pub command: String,

    /// Named parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, JsonValue>,

    /// Named input artifacts (local paths or store URLs)
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    /// Named output artifacts (local destination paths)
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,

    /// Additional files that must be available before the batch starts
    #[serde(default)]
    pub files_to_realize: Vec<String>,

    /// Handler-imposed timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Bypass the job result cache
    #[serde(default)]
    pub force_run: bool,
}

impl JobSpec {
    /// Create a specification for a shell command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            label: String::new(),
            command: command.into(),
            parameters: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            files_to_realize: Vec::new(),
            timeout_secs: None,
            force_run: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), path.into());
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), path.into());
        self
    }

    pub fn with_timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }

    pub fn with_force_run(mut self, force_run: bool) -> Self {
        self.force_run = force_run;
        self
    }

    /// Every artifact that must be realized before this job can run
    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .values()
            .chain(self.files_to_realize.iter())
            .map(String::as_str)
    }

    /// Whether `location` names a content-addressed store artifact
    pub fn is_store_url(location: &str) -> bool {
        location.starts_with(STORE_URL_PREFIX)
    }

    /// Local (non store URL) artifacts whose content the output depends on
    pub fn local_inputs(&self) -> impl Iterator<Item = &str> {
        self.required_inputs()
            .filter(|location| !Self::is_store_url(location))
    }

    /// Stable SHA-256 signature of the specification alone
    ///
    /// Label and `force_run` are cosmetic and excluded, so relabelling a job
    /// keeps its cached result.
    pub fn signature(&self) -> String {
        self.content_signature(&BTreeMap::new())
    }

    /// Signature that also covers the content of local inputs
    ///
    /// `input_digests` maps each local input location to a digest of its
    /// current content. Store URLs already name their content.
    pub fn content_signature(&self, input_digests: &BTreeMap<String, String>) -> String {
        let canonical = serde_json::json!({
            "command": self.command,
            "parameters": self.parameters,
            "inputs": self.inputs,
            "outputs": self.outputs,
            "files_to_realize": self.files_to_realize,
            "input_content": input_digests,
        });
        // serde_json maps are ordered, so this serialization is canonical
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        format!("{:x}", digest)
    }

    /// Rewrite relative local input paths as absolute paths under `base`
    ///
    /// Store URLs are left untouched.
    pub fn absolutize_inputs(&mut self, base: &Path) {
        let absolutize = |path: &mut String| {
            if Self::is_store_url(path) || Path::new(path.as_str()).is_absolute() {
                return;
            }
            *path = base.join(path.as_str()).to_string_lossy().into_owned();
        };

        self.inputs.values_mut().for_each(absolutize);
        self.files_to_realize.iter_mut().for_each(absolutize);
    }
}

/// A job within a batch: its specification plus a result slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub spec: JobSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl Job {
    pub fn new(spec: JobSpec) -> Self {
        Self { spec, result: None }
    }

    /// Whether the job already carries a computed result
    pub fn is_computed(&self) -> bool {
        self.result.as_ref().is_some_and(JobResult::is_computed)
    }

    pub fn label(&self) -> &str {
        &self.spec.label
    }
}

impl From<JobSpec> for Job {
    fn from(spec: JobSpec) -> Self {
        Job::new(spec)
    }
}
