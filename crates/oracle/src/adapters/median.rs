//! Numeric median over a job's inputs.

use crate::adapter::{Adapter, AdapterError, AdapterResult, AdapterStore, RuntimeInput};
use crate::spec::OracleJob;
use crate::value::GenericValue;
use async_trait::async_trait;

/// Writes the median of the job's input values under its output id.
pub struct Median;

#[async_trait]
impl Adapter for Median {
    fn id(&self) -> &'static str {
        "median"
    }

    async fn perform(
        &self,
        job: &OracleJob,
        result: &mut AdapterResult,
        _input: &RuntimeInput,
        _store: &mut AdapterStore,
    ) -> Result<(), AdapterError> {
        let mut values = Vec::new();
        for input in job.inputs() {
            let value = result.get(input).ok_or_else(|| AdapterError::MissingInput {
                input: input.to_string(),
            })?;
            let n = value.as_f64().ok_or_else(|| AdapterError::NonNumericInput {
                input: input.to_string(),
            })?;
            values.push(n);
        }
        if values.is_empty() {
            return Err(AdapterError::MissingInput {
                input: job.output_id.clone(),
            });
        }

        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        let median = if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };

        result.set(&job.output_id, GenericValue::Number(median));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn job(inputs: &[&str]) -> OracleJob {
        OracleJob {
            adapter: "median".to_string(),
            input_id: String::new(),
            input_ids: inputs.iter().map(|s| s.to_string()).collect(),
            output_id: "med".to_string(),
            config: serde_json::Map::new(),
        }
    }

    fn input() -> RuntimeInput {
        RuntimeInput::new(0, Arc::new(serde_json::Map::new()))
    }

    #[tokio::test]
    async fn odd_and_even_counts() {
        let mut result = AdapterResult::new();
        result.set("a", GenericValue::Number(3.0));
        result.set("b", GenericValue::Text("1".to_string()));
        result.set("c", GenericValue::Number(2.0));
        result.set("d", GenericValue::Number(10.0));

        let mut store = AdapterStore::new();
        Median
            .perform(&job(&["a", "b", "c"]), &mut result, &input(), &mut store)
            .await
            .unwrap();
        assert_eq!(result.get("med"), Some(&GenericValue::Number(2.0)));

        Median
            .perform(&job(&["a", "b", "c", "d"]), &mut result, &input(), &mut store)
            .await
            .unwrap();
        assert_eq!(result.get("med"), Some(&GenericValue::Number(2.5)));
    }

    #[tokio::test]
    async fn non_numeric_input_errors() {
        let mut result = AdapterResult::new();
        result.set("a", GenericValue::Text("not a number".to_string()));
        let mut store = AdapterStore::new();
        let err = Median
            .perform(&job(&["a"]), &mut result, &input(), &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::NonNumericInput { .. }));
    }

    #[tokio::test]
    async fn missing_input_errors() {
        let mut result = AdapterResult::new();
        let mut store = AdapterStore::new();
        let err = Median
            .perform(&job(&["ghost"]), &mut result, &input(), &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::MissingInput { .. }));
    }
}
