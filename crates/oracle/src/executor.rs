//! The executor driver: spec sync, per-window dedup, and the job loop.

use crate::adapter::{Adapter, AdapterRegistry, AdapterResult, AdapterStore, RuntimeInput};
use crate::kv::{
    adapter_store_key, oracle_lock_key, oracle_result_key, KvError, KvStore,
    LAST_SUBMISSION_TIME_KEY,
};
use crate::parser::{parse_spec, validate_jobs};
use crate::spec::{Oracle, OracleJob};
use crate::submit::{MsgCreateVote, VoteSubmitter};
use crate::value::GenericValue;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tidemark_wire::Vote;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// An oracle as listed on chain, spec still in raw JSON form.
#[derive(Debug, Clone)]
pub struct OracleDefinition {
    pub id: String,
    pub resolution: u64,
    pub spec: String,
}

/// Failure fetching the on-chain oracle list.
#[derive(Debug, Error)]
#[error("spec provider unavailable: {0}")]
pub struct ProviderError(pub String);

/// Capability to query the active on-chain oracle list.
///
/// Backed by the chain's gRPC query service in the node; tests supply a
/// static list.
#[async_trait]
pub trait SpecProvider: Send + Sync {
    async fn active_oracles(&self) -> Result<Vec<OracleDefinition>, ProviderError>;
}

/// Failures that abort one oracle's tick. The next tick retries.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Kv(#[from] KvError),

    #[error("corrupt adapter store: {0}")]
    StoreCodec(#[from] serde_json::Error),

    #[error("skipping submission for {oracle}: result is empty")]
    EmptyResult { oracle: String },
}

/// Executor tuning knobs.
#[derive(Clone)]
pub struct ExecutorConfig {
    /// Cadence of the per-oracle execution fan-out.
    pub tick_interval: Duration,
    /// How often the oracle list is re-synced from chain state.
    pub spec_sync_interval: Duration,
    /// Backoff after a wholly failed sync (chain app not ready yet).
    pub sync_retry: Duration,
    /// TTL of the per-window submission lock.
    pub lock_ttl: Duration,
    /// Dev-only: replace computed results with the time-derived stub.
    pub overwrite_data: bool,
    /// Adapter sections of the node's oracle configuration.
    pub adapter_config: Arc<serde_json::Map<String, serde_json::Value>>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            spec_sync_interval: Duration::from_secs(60),
            sync_retry: Duration::from_secs(1),
            lock_ttl: Duration::from_secs(300),
            overwrite_data: overwrite_from_env(),
            adapter_config: Arc::new(serde_json::Map::new()),
        }
    }
}

/// Read the `OracleOverwriteData` development flag.
pub fn overwrite_from_env() -> bool {
    std::env::var("OracleOverwriteData").map_or(false, |v| v == "true")
}

/// The cached `oracle:oracle-result:<id>` payload.
#[derive(Debug, Serialize, Deserialize)]
struct CachedResult {
    price: String,
    timestamp: i64,
}

/// Runs oracle specs and feeds the gossip signer.
///
/// One driver task owns the loop; each tick fans out one task per known
/// oracle. The oracle set is a snapshot swapped atomically on re-sync.
pub struct Executor {
    config: ExecutorConfig,
    kv: Arc<dyn KvStore>,
    adapters: Arc<AdapterRegistry>,
    provider: Arc<dyn SpecProvider>,
    submitter: Arc<dyn VoteSubmitter>,
    vote_tx: mpsc::UnboundedSender<Vote>,
    oracles: RwLock<Arc<Vec<Oracle>>>,
}

impl Executor {
    pub fn new(
        config: ExecutorConfig,
        kv: Arc<dyn KvStore>,
        adapters: Arc<AdapterRegistry>,
        provider: Arc<dyn SpecProvider>,
        submitter: Arc<dyn VoteSubmitter>,
        vote_tx: mpsc::UnboundedSender<Vote>,
    ) -> Self {
        Self {
            config,
            kv,
            adapters,
            provider,
            submitter,
            vote_tx,
            oracles: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// The currently known oracle set.
    pub fn oracle_snapshot(&self) -> Arc<Vec<Oracle>> {
        self.oracles.read().clone()
    }

    /// Drive the executor until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("oracle executor started");
        let mut last_sync: Option<Instant> = None;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let sync_due = last_sync.map_or(true, |at| at.elapsed() >= self.config.spec_sync_interval);
            if sync_due {
                match self.sync_oracles().await {
                    Ok(oracles) => {
                        info!(count = oracles.len(), "synced oracle specs");
                        *self.oracles.write() = Arc::new(oracles);
                        last_sync = Some(Instant::now());
                    }
                    Err(err) => {
                        // Chain app not ready yet; keep retrying forever.
                        warn!(error = %err, "oracle spec sync failed");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(self.config.sync_retry) => {}
                        }
                        continue;
                    }
                }
            }

            self.run_oracles(unix_now());

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.tick_interval) => {}
            }
        }
        info!("oracle executor stopped");
    }

    /// Fetch and validate the active oracle list.
    ///
    /// Per-oracle failures are logged and skipped; the caller keeps the
    /// previous good set when the whole sync fails.
    async fn sync_oracles(&self) -> Result<Vec<Oracle>, ProviderError> {
        let definitions = self.provider.active_oracles().await?;
        let mut oracles = Vec::with_capacity(definitions.len());

        for def in definitions {
            if def.resolution == 0 {
                warn!(oracle = %def.id, "invalid oracle resolution of zero");
                continue;
            }
            let spec = match parse_spec(&def.spec) {
                Ok(spec) => spec,
                Err(err) => {
                    warn!(oracle = %def.id, error = %err, "invalid oracle spec");
                    continue;
                }
            };
            if let Err(err) = validate_jobs(&self.adapters, &spec) {
                warn!(oracle = %def.id, error = %err, "invalid oracle jobs");
                continue;
            }
            oracles.push(Oracle {
                id: def.id,
                resolution: def.resolution,
                spec,
            });
        }
        Ok(oracles)
    }

    /// Fan out one execution task per known oracle.
    fn run_oracles(self: &Arc<Self>, now: i64) {
        let snapshot = self.oracle_snapshot();
        for oracle in snapshot.iter() {
            let executor = self.clone();
            let oracle = oracle.clone();
            tokio::spawn(async move {
                if let Err(err) = executor.run_oracle(&oracle, now).await {
                    warn!(oracle = %oracle.id, error = %err, "oracle run failed");
                }
            });
        }
    }

    /// Execute one oracle for the window containing `now`.
    pub async fn run_oracle(&self, oracle: &Oracle, now: i64) -> Result<(), ExecutorError> {
        let normalized_time = (now as u64 / oracle.resolution) * oracle.resolution;

        // Window already submitted by this fleet?
        if let Some(last) = self.kv.get(LAST_SUBMISSION_TIME_KEY).await? {
            if let Ok(last) = last.parse::<u64>() {
                if normalized_time <= last {
                    return Ok(());
                }
            }
        }

        // Claim the window; exactly one worker proceeds past this point.
        let lock_key = oracle_lock_key(&oracle.id, normalized_time);
        if !self
            .kv
            .set_nx(&lock_key, "1".to_string(), self.config.lock_ttl)
            .await?
        {
            return Ok(());
        }

        let mut result = AdapterResult::new();
        let mut input = RuntimeInput::new(now, self.config.adapter_config.clone());

        for job in &oracle.spec.jobs {
            let adapter = self
                .adapters
                .get(&job.adapter)
                .unwrap_or_else(|| panic!("adapter should exist: {}", job.adapter));
            input.last_store_data = self.load_store(adapter.as_ref(), job).await?;

            let mut store = AdapterStore::new();
            if let Err(err) = adapter.perform(job, &mut result, &input, &mut store).await {
                error!(
                    oracle = %oracle.id,
                    adapter = %adapter.id(),
                    error = %err,
                    "adapter failed"
                );
                if oracle.spec.should_early_terminate {
                    break;
                }
            }
            if store.should_persist {
                self.persist_store(adapter.as_ref(), job, &store).await?;
            }
        }

        self.kv
            .set(LAST_SUBMISSION_TIME_KEY, normalized_time.to_string())
            .await?;

        let mut data = result
            .get(&oracle.spec.output_id)
            .map(GenericValue::to_string)
            .unwrap_or_default();

        self.save_oracle_result(&oracle.id, &data, now).await;

        if self.config.overwrite_data {
            data = overwrite_data(&oracle.id, data, now);
        }

        if data.is_empty() {
            return Err(ExecutorError::EmptyResult {
                oracle: oracle.id.clone(),
            });
        }

        let vote = Vote {
            validator: String::new(),
            oracle_id: oracle.id.clone(),
            timestamp: normalized_time as i64,
            data: data.clone(),
        };
        if self.vote_tx.send(vote).is_err() {
            warn!("unsigned vote channel closed, dropping observation");
        }

        self.submit_on_chain(MsgCreateVote {
            creator: self.submitter.creator(),
            oracle_id: oracle.id.clone(),
            timestamp: normalized_time as i64,
            data,
        });

        Ok(())
    }

    /// Fire-and-forget on-chain submission; the outcome is only logged.
    fn submit_on_chain(&self, msg: MsgCreateVote) {
        let submitter = self.submitter.clone();
        tokio::spawn(async move {
            match submitter.voting_power().await {
                Ok(0) => {
                    debug!(oracle = %msg.oracle_id, "zero voting power, skipping on-chain vote")
                }
                Ok(_) => {
                    let oracle_id = msg.oracle_id.clone();
                    match submitter.submit_vote(msg).await {
                        Ok(()) => debug!(oracle = %oracle_id, "vote submitted"),
                        Err(err) => warn!(oracle = %oracle_id, error = %err, "vote submission failed"),
                    }
                }
                Err(err) => warn!(error = %err, "voting power query failed"),
            }
        });
    }

    async fn load_store(
        &self,
        adapter: &dyn Adapter,
        job: &OracleJob,
    ) -> Result<Option<HashMap<String, GenericValue>>, ExecutorError> {
        let key = adapter_store_key(adapter.id(), &job.input_id);
        match self.kv.get(&key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn persist_store(
        &self,
        adapter: &dyn Adapter,
        job: &OracleJob,
        store: &AdapterStore,
    ) -> Result<(), ExecutorError> {
        let key = adapter_store_key(adapter.id(), &job.input_id);
        let raw = serde_json::to_string(&store.data)?;
        self.kv.set(&key, raw).await?;
        Ok(())
    }

    /// Cache the latest non-empty result; failures are logged, not fatal.
    async fn save_oracle_result(&self, oracle_id: &str, data: &str, now: i64) {
        if data.is_empty() {
            return;
        }
        let cached = CachedResult {
            price: data.to_string(),
            timestamp: now,
        };
        let raw = match serde_json::to_string(&cached) {
            Ok(raw) => raw,
            Err(err) => {
                error!(oracle = %oracle_id, error = %err, "result cache encode failed");
                return;
            }
        };
        if let Err(err) = self.kv.set(&oracle_result_key(oracle_id), raw).await {
            error!(oracle = %oracle_id, error = %err, "result cache write failed");
        }
    }
}

/// Wall-clock seconds since the epoch.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Development stub: derive a deterministic DXBT price from the clock.
///
/// Even minutes ramp up from 15000, odd minutes ramp down from 10000, in
/// 10-second steps. Only DXBT is overwritten; every other id passes through.
fn overwrite_data(oracle_id: &str, data: String, now: i64) -> String {
    if oracle_id != "DXBT" {
        return data;
    }

    let (min, max, interval) = (15000i64, 10000i64, 20i64);
    let minute = now / 60;
    let seconds = now - minute * 60;
    let rounded_seconds = (seconds / 10) * 10;

    if minute % 2 == 0 {
        if rounded_seconds == 0 {
            return min.to_string();
        }
        format!(
            "{}.{}{}",
            min + rounded_seconds * interval,
            seconds / 10,
            10 - seconds / 10
        )
    } else {
        if rounded_seconds == 0 {
            return max.to_string();
        }
        format!(
            "{}.{}{}",
            max - rounded_seconds * interval,
            seconds / 10 + 4,
            10 - seconds / 10
        )
    }
}
