//! HTTP source adapter: fetch a JSON document, extract one value.

use crate::adapter::{Adapter, AdapterError, AdapterResult, AdapterStore, RuntimeInput};
use crate::spec::OracleJob;
use crate::value::GenericValue;
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches `config.url` and writes the value found at the dotted
/// `config.path` of the JSON body under the job's output id.
///
/// The node-level `http_fetcher.timeout_ms` config section overrides the
/// request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn job_param<'a>(job: &'a OracleJob, param: &str) -> Result<&'a str, AdapterError> {
    job.config
        .get(param)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AdapterError::MissingParam {
            param: param.to_string(),
        })
}

/// Walk a dotted path (`"data.last"`) through a JSON document.
fn extract_path<'a>(body: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = body;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn value_of(json: &serde_json::Value) -> Option<GenericValue> {
    match json {
        serde_json::Value::Number(n) => n.as_f64().map(GenericValue::Number),
        serde_json::Value::String(s) => Some(GenericValue::Text(s.clone())),
        _ => None,
    }
}

#[async_trait]
impl Adapter for HttpFetcher {
    fn id(&self) -> &'static str {
        "http_fetcher"
    }

    async fn perform(
        &self,
        job: &OracleJob,
        result: &mut AdapterResult,
        input: &RuntimeInput,
        _store: &mut AdapterStore,
    ) -> Result<(), AdapterError> {
        let url = job_param(job, "url")?;
        let path = job_param(job, "path")?;

        let timeout = input
            .config
            .get(self.id())
            .and_then(|section| section.get("timeout_ms"))
            .and_then(|v| v.as_u64())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let body: serde_json::Value = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let value = extract_path(&body, path)
            .and_then(value_of)
            .ok_or_else(|| AdapterError::ResponsePath {
                path: path.to_string(),
            })?;

        result.set(&job.output_id, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_dotted_path() {
        let body = json!({"data": {"last": "42000.5", "volume": 12}});
        assert_eq!(
            extract_path(&body, "data.last").and_then(value_of),
            Some(GenericValue::Text("42000.5".to_string()))
        );
        assert_eq!(
            extract_path(&body, "data.volume").and_then(value_of),
            Some(GenericValue::Number(12.0))
        );
        assert!(extract_path(&body, "data.bid").is_none());
        assert!(extract_path(&body, "data").and_then(value_of).is_none());
    }

    #[test]
    fn missing_params_surface() {
        let job = OracleJob {
            adapter: "http_fetcher".to_string(),
            input_id: String::new(),
            input_ids: vec![],
            output_id: "raw".to_string(),
            config: serde_json::Map::new(),
        };
        assert!(matches!(
            job_param(&job, "url"),
            Err(AdapterError::MissingParam { .. })
        ));
    }
}
