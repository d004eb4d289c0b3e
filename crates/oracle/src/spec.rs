//! Oracle specs: the resolved job graph executed per resolution window.

use serde::{Deserialize, Serialize};

/// One adapter invocation in a spec's ordered job list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleJob {
    /// Registry id of the adapter to run.
    pub adapter: String,
    /// Primary input: the output id of an earlier job (empty for sources).
    #[serde(default)]
    pub input_id: String,
    /// Additional inputs, for aggregating adapters.
    #[serde(default)]
    pub input_ids: Vec<String>,
    /// Where this job writes its value in the running result.
    pub output_id: String,
    /// Arbitrary per-job parameters, interpreted by the adapter.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl OracleJob {
    /// Every input this job reads, primary first.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.input_id.as_str())
            .filter(|s| !s.is_empty())
            .chain(self.input_ids.iter().map(String::as_str))
    }
}

/// A validated job graph for one oracle.
///
/// Immutable after parsing; the executor re-syncs the whole set from chain
/// state and swaps it atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSpec {
    /// Jobs in dependency order.
    pub jobs: Vec<OracleJob>,
    /// The result id whose value becomes the submitted observation.
    pub output_id: String,
    /// Stop the job loop on the first adapter error.
    #[serde(default)]
    pub should_early_terminate: bool,
}

/// An active oracle: identity, submission period, and its resolved spec.
#[derive(Debug, Clone)]
pub struct Oracle {
    pub id: String,
    /// Resolution period in seconds; observations are normalized to
    /// multiples of this.
    pub resolution: u64,
    pub spec: OracleSpec,
}
