//! The adapter contract and registry.
//!
//! Adapters are pure functions of their declared inputs: the job, the
//! running result, the runtime input, and their persisted store. They may do
//! bounded external I/O (HTTP, KV reads) but hold no hidden state.

use crate::spec::OracleJob;
use crate::value::GenericValue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failures from a single adapter invocation.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("missing input {input:?}")]
    MissingInput { input: String },

    #[error("non-numeric input {input:?}")]
    NonNumericInput { input: String },

    #[error("missing job parameter {param:?}")]
    MissingParam { param: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no value at response path {path:?}")]
    ResponsePath { path: String },
}

/// The accumulating named-value result graph for one spec execution.
#[derive(Debug, Default, Clone)]
pub struct AdapterResult {
    data: HashMap<String, GenericValue>,
}

impl AdapterResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value by result id.
    pub fn get(&self, id: &str) -> Option<&GenericValue> {
        self.data.get(id)
    }

    /// Write a value under a result id.
    pub fn set(&mut self, id: impl Into<String>, value: GenericValue) {
        self.data.insert(id.into(), value);
    }
}

/// Per-job scratch space, persisted across runs when the adapter asks.
#[derive(Debug, Default, Clone)]
pub struct AdapterStore {
    pub data: HashMap<String, GenericValue>,
    /// Set by the adapter to have the store written back to the KV store
    /// under `(adapter_id, input_id)`.
    pub should_persist: bool,
}

impl AdapterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Ambient inputs for one spec execution.
#[derive(Debug, Clone)]
pub struct RuntimeInput {
    /// Wall-clock seconds at the start of the execution.
    pub begin_time: i64,
    /// Adapter sections of the node's oracle configuration.
    pub config: Arc<serde_json::Map<String, serde_json::Value>>,
    /// The store persisted by this adapter for this job's input id, if any.
    pub last_store_data: Option<HashMap<String, GenericValue>>,
}

impl RuntimeInput {
    pub fn new(begin_time: i64, config: Arc<serde_json::Map<String, serde_json::Value>>) -> Self {
        Self {
            begin_time,
            config,
            last_store_data: None,
        }
    }
}

/// A pluggable computation node in an oracle's job graph.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Registry id, referenced by `OracleJob::adapter`.
    fn id(&self) -> &'static str;

    /// Run one job, reading `result` and writing the job's output into it.
    async fn perform(
        &self,
        job: &OracleJob,
        result: &mut AdapterResult,
        input: &RuntimeInput,
        store: &mut AdapterStore,
    ) -> Result<(), AdapterError>;
}

/// Open registry of adapters keyed by id.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard adapter set.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::adapters::HttpFetcher::new()));
        registry.register(Arc::new(crate::adapters::Median));
        registry.register(Arc::new(crate::adapters::LastValue));
        registry
    }

    /// Add an adapter. Last registration wins for a duplicate id.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    /// Look up an adapter by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(id).cloned()
    }

    /// Whether an adapter id is registered (spec validation).
    pub fn has(&self, id: &str) -> bool {
        self.adapters.contains_key(id)
    }
}
