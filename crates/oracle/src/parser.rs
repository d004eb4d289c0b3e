//! Spec parsing and validation.
//!
//! Validation runs at sync time so that execution can assume a well-formed
//! graph: every referenced adapter exists and every input refers to an
//! output produced by an earlier job.

use crate::adapter::AdapterRegistry;
use crate::spec::OracleSpec;
use std::collections::HashSet;
use thiserror::Error;

/// Reasons a spec is rejected at sync time.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid spec json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spec has no jobs")]
    Empty,

    #[error("job {index} has an empty output id")]
    EmptyOutputId { index: usize },

    #[error("duplicate output id {id:?}")]
    DuplicateOutputId { id: String },

    #[error("job {index} references unknown adapter {adapter:?}")]
    UnknownAdapter { index: usize, adapter: String },

    #[error("job {index} input {input:?} is not produced by an earlier job")]
    UnresolvedInput { index: usize, input: String },

    #[error("spec output id {id:?} is not produced by any job")]
    UnresolvedOutput { id: String },
}

/// Parse a raw on-chain spec string.
pub fn parse_spec(raw: &str) -> Result<OracleSpec, SpecError> {
    let spec: OracleSpec = serde_json::from_str(raw)?;
    if spec.jobs.is_empty() {
        return Err(SpecError::Empty);
    }
    Ok(spec)
}

/// Validate a parsed spec against the adapter registry.
pub fn validate_jobs(registry: &AdapterRegistry, spec: &OracleSpec) -> Result<(), SpecError> {
    let mut produced: HashSet<&str> = HashSet::new();

    for (index, job) in spec.jobs.iter().enumerate() {
        if job.output_id.is_empty() {
            return Err(SpecError::EmptyOutputId { index });
        }
        if !registry.has(&job.adapter) {
            return Err(SpecError::UnknownAdapter {
                index,
                adapter: job.adapter.clone(),
            });
        }
        for input in job.inputs() {
            if !produced.contains(input) {
                return Err(SpecError::UnresolvedInput {
                    index,
                    input: input.to_string(),
                });
            }
        }
        if !produced.insert(&job.output_id) {
            return Err(SpecError::DuplicateOutputId {
                id: job.output_id.clone(),
            });
        }
    }

    if !produced.contains(spec.output_id.as_str()) {
        return Err(SpecError::UnresolvedOutput {
            id: spec.output_id.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AdapterRegistry {
        AdapterRegistry::standard()
    }

    fn spec(json: &str) -> OracleSpec {
        parse_spec(json).unwrap()
    }

    #[test]
    fn valid_chain_passes() {
        let s = spec(
            r#"{
                "jobs": [
                    {"adapter": "http_fetcher", "output_id": "raw",
                     "config": {"url": "http://x/price", "path": "data.last"}},
                    {"adapter": "last_value", "input_id": "raw", "output_id": "price"}
                ],
                "output_id": "price"
            }"#,
        );
        validate_jobs(&registry(), &s).unwrap();
    }

    #[test]
    fn unknown_adapter_rejected() {
        let s = spec(r#"{"jobs": [{"adapter": "nope", "output_id": "x"}], "output_id": "x"}"#);
        assert!(matches!(
            validate_jobs(&registry(), &s),
            Err(SpecError::UnknownAdapter { index: 0, .. })
        ));
    }

    #[test]
    fn forward_reference_rejected() {
        let s = spec(
            r#"{
                "jobs": [
                    {"adapter": "last_value", "input_id": "later", "output_id": "x"},
                    {"adapter": "http_fetcher", "output_id": "later",
                     "config": {"url": "http://x", "path": "p"}}
                ],
                "output_id": "x"
            }"#,
        );
        assert!(matches!(
            validate_jobs(&registry(), &s),
            Err(SpecError::UnresolvedInput { index: 0, .. })
        ));
    }

    #[test]
    fn unresolved_spec_output_rejected() {
        let s = spec(
            r#"{"jobs": [{"adapter": "http_fetcher", "output_id": "raw",
                          "config": {"url": "http://x", "path": "p"}}],
                "output_id": "price"}"#,
        );
        assert!(matches!(
            validate_jobs(&registry(), &s),
            Err(SpecError::UnresolvedOutput { .. })
        ));
    }

    #[test]
    fn empty_jobs_rejected() {
        assert!(matches!(
            parse_spec(r#"{"jobs": [], "output_id": "x"}"#),
            Err(SpecError::Empty)
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(parse_spec("{"), Err(SpecError::Json(_))));
    }
}
