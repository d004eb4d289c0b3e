//! Gap-filling adapter backed by the persisted adapter store.

use crate::adapter::{Adapter, AdapterError, AdapterResult, AdapterStore, RuntimeInput};
use crate::spec::OracleJob;
use async_trait::async_trait;
use tracing::debug;

const LAST_KEY: &str = "last";

/// Passes its input through, remembering the last good value in the adapter
/// store. When the input is missing or empty (a source hiccup), the
/// remembered value fills the gap.
pub struct LastValue;

#[async_trait]
impl Adapter for LastValue {
    fn id(&self) -> &'static str {
        "last_value"
    }

    async fn perform(
        &self,
        job: &OracleJob,
        result: &mut AdapterResult,
        input: &RuntimeInput,
        store: &mut AdapterStore,
    ) -> Result<(), AdapterError> {
        let fresh = result.get(&job.input_id).filter(|v| !v.is_empty()).cloned();

        match fresh {
            Some(value) => {
                store.data.insert(LAST_KEY.to_string(), value.clone());
                store.should_persist = true;
                result.set(&job.output_id, value);
                Ok(())
            }
            None => {
                let remembered = input
                    .last_store_data
                    .as_ref()
                    .and_then(|data| data.get(LAST_KEY))
                    .cloned();
                match remembered {
                    Some(value) => {
                        debug!(input = %job.input_id, "filling gap from persisted store");
                        result.set(&job.output_id, value);
                        Ok(())
                    }
                    None => Err(AdapterError::MissingInput {
                        input: job.input_id.clone(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::GenericValue;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn job() -> OracleJob {
        OracleJob {
            adapter: "last_value".to_string(),
            input_id: "raw".to_string(),
            input_ids: vec![],
            output_id: "price".to_string(),
            config: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn fresh_value_passes_and_persists() {
        let mut result = AdapterResult::new();
        result.set("raw", GenericValue::Text("42000".to_string()));
        let input = RuntimeInput::new(0, Arc::new(serde_json::Map::new()));
        let mut store = AdapterStore::new();

        LastValue
            .perform(&job(), &mut result, &input, &mut store)
            .await
            .unwrap();

        assert_eq!(result.get("price"), Some(&GenericValue::Text("42000".into())));
        assert!(store.should_persist);
        assert_eq!(
            store.data.get(LAST_KEY),
            Some(&GenericValue::Text("42000".into()))
        );
    }

    #[tokio::test]
    async fn gap_filled_from_store() {
        let mut result = AdapterResult::new();
        let mut input = RuntimeInput::new(0, Arc::new(serde_json::Map::new()));
        input.last_store_data = Some(HashMap::from([(
            LAST_KEY.to_string(),
            GenericValue::Text("41990".to_string()),
        )]));
        let mut store = AdapterStore::new();

        LastValue
            .perform(&job(), &mut result, &input, &mut store)
            .await
            .unwrap();

        assert_eq!(result.get("price"), Some(&GenericValue::Text("41990".into())));
        assert!(!store.should_persist);
    }

    #[tokio::test]
    async fn no_value_anywhere_errors() {
        let mut result = AdapterResult::new();
        let input = RuntimeInput::new(0, Arc::new(serde_json::Map::new()));
        let mut store = AdapterStore::new();

        let err = LastValue
            .perform(&job(), &mut result, &input, &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::MissingInput { .. }));
    }
}
