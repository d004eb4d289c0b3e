//! The oracle reactor: component lifecycles and the peer-protocol surface.

use crate::broadcast::broadcast_votes_routine;
use crate::buffer::{GossipVoteBuffer, InstallOutcome, UnsignedVoteBuffer};
use crate::config::OracleConfig;
use crate::metrics;
use crate::peer::{
    ChannelDescriptor, Envelope, Peer, PeerSlotError, PeerSlots, ORACLE_CHANNEL_ID,
    ORACLE_CHANNEL_PRIORITY,
};
use crate::prune::{GossipPruner, UnsignedVotePruner};
use crate::signer::VoteSigner;
use crate::state::ChainStateReader;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tidemark_oracle::{
    AdapterRegistry, Executor, ExecutorConfig, KvStore, SpecProvider, VoteSubmitter,
};
use tidemark_types::{PrivValidator, PublicKey, SignScheme};
use tidemark_wire::{decode_gossip_vote, sign_bytes, Vote, MAX_GOSSIP_MSG_BYTES};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Reactor construction and lifecycle errors.
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("{0} is required")]
    MissingDependency(&'static str),

    #[error("reactor already started")]
    AlreadyStarted,

    #[error(transparent)]
    PeerSlot(#[from] PeerSlotError),
}

/// Ingress failures that terminate the offending peer.
///
/// Everything else at ingress (malformed payloads, bad signatures, stale
/// batches) is dropped without penalty; only traffic the oracle channel
/// cannot carry at all stops the peer.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("oracle reactor cannot handle messages on channel {channel_id:#04x}")]
    UnknownChannel { channel_id: u8 },
}

/// Builder for [`Reactor`].
///
/// Required: config, chain id, private validator, chain state, KV store,
/// spec provider, and vote submitter. The adapter registry defaults to the
/// standard set.
pub struct ReactorBuilder {
    config: Option<OracleConfig>,
    chain_id: Option<String>,
    priv_validator: Option<Arc<dyn PrivValidator>>,
    state: Option<Arc<dyn ChainStateReader>>,
    kv: Option<Arc<dyn KvStore>>,
    adapters: Option<Arc<AdapterRegistry>>,
    provider: Option<Arc<dyn SpecProvider>>,
    submitter: Option<Arc<dyn VoteSubmitter>>,
    executor_config: Option<ExecutorConfig>,
}

impl ReactorBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            chain_id: None,
            priv_validator: None,
            state: None,
            kv: None,
            adapters: None,
            provider: None,
            submitter: None,
            executor_config: None,
        }
    }

    pub fn config(mut self, config: OracleConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    pub fn priv_validator(mut self, priv_validator: Arc<dyn PrivValidator>) -> Self {
        self.priv_validator = Some(priv_validator);
        self
    }

    pub fn chain_state(mut self, state: Arc<dyn ChainStateReader>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn kv_store(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn adapters(mut self, adapters: Arc<AdapterRegistry>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    pub fn spec_provider(mut self, provider: Arc<dyn SpecProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn vote_submitter(mut self, submitter: Arc<dyn VoteSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Override executor timing, mainly for tests.
    pub fn executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor_config = Some(config);
        self
    }

    pub fn build(self) -> Result<Reactor, ReactorError> {
        let config = self.config.unwrap_or_default();
        let chain_id = self
            .chain_id
            .ok_or(ReactorError::MissingDependency("chain_id"))?;
        let priv_validator = self
            .priv_validator
            .ok_or(ReactorError::MissingDependency("priv_validator"))?;
        let state = self
            .state
            .ok_or(ReactorError::MissingDependency("chain_state"))?;
        let kv = self.kv.ok_or(ReactorError::MissingDependency("kv_store"))?;
        let provider = self
            .provider
            .ok_or(ReactorError::MissingDependency("spec_provider"))?;
        let submitter = self
            .submitter
            .ok_or(ReactorError::MissingDependency("vote_submitter"))?;
        let adapters = self
            .adapters
            .unwrap_or_else(|| Arc::new(AdapterRegistry::standard()));

        let executor_config = self.executor_config.unwrap_or_else(|| ExecutorConfig {
            adapter_config: config.adapters.clone(),
            ..ExecutorConfig::default()
        });

        let (vote_tx, vote_rx) = mpsc::unbounded_channel();

        Ok(Reactor {
            config,
            chain_id,
            priv_validator,
            state,
            kv,
            adapters,
            provider,
            submitter,
            executor_config,
            gossip: Arc::new(GossipVoteBuffer::new()),
            unsigned: Arc::new(UnsignedVoteBuffer::new()),
            slots: PeerSlots::new(),
            vote_tx,
            vote_rx: Mutex::new(Some(vote_rx)),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the gossip buffers, the signing identity, and every long-lived
/// worker: the job executor, the signer loop, both pruners, and one
/// broadcaster per peer.
///
/// Workers run under one supervised group: a shared cancellation token
/// consulted at every loop head, and a task tracker awaited on [`stop`].
///
/// [`stop`]: Reactor::stop
pub struct Reactor {
    config: OracleConfig,
    chain_id: String,
    priv_validator: Arc<dyn PrivValidator>,
    state: Arc<dyn ChainStateReader>,
    kv: Arc<dyn KvStore>,
    adapters: Arc<AdapterRegistry>,
    provider: Arc<dyn SpecProvider>,
    submitter: Arc<dyn VoteSubmitter>,
    executor_config: ExecutorConfig,
    gossip: Arc<GossipVoteBuffer>,
    unsigned: Arc<UnsignedVoteBuffer>,
    slots: PeerSlots,
    vote_tx: mpsc::UnboundedSender<Vote>,
    vote_rx: Mutex<Option<mpsc::UnboundedReceiver<Vote>>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor").finish_non_exhaustive()
    }
}

impl Reactor {
    pub fn builder() -> ReactorBuilder {
        ReactorBuilder::new()
    }

    /// The channels this reactor registers with the P2P switch.
    pub fn channels() -> Vec<ChannelDescriptor> {
        vec![ChannelDescriptor {
            id: ORACLE_CHANNEL_ID,
            priority: ORACLE_CHANNEL_PRIORITY,
            recv_message_capacity: MAX_GOSSIP_MSG_BYTES,
        }]
    }

    /// Producer handle for raw observations (the application surface).
    pub fn vote_sender(&self) -> mpsc::UnboundedSender<Vote> {
        self.vote_tx.clone()
    }

    /// The per-validator latest-batch store.
    pub fn gossip_buffer(&self) -> &Arc<GossipVoteBuffer> {
        &self.gossip
    }

    /// Launch the job executor, the signer, and both pruners.
    ///
    /// The only failure mode is a second start; it occurs before anything is
    /// spawned, so a failed start leaves no running workers.
    pub fn start(&self) -> Result<(), ReactorError> {
        let vote_rx = self
            .vote_rx
            .lock()
            .take()
            .ok_or(ReactorError::AlreadyStarted)?;

        info!("starting oracle reactor");

        let executor = Arc::new(Executor::new(
            self.executor_config.clone(),
            self.kv.clone(),
            self.adapters.clone(),
            self.provider.clone(),
            self.submitter.clone(),
            self.vote_tx.clone(),
        ));
        self.tracker.spawn(executor.run(self.shutdown.clone()));

        let signer = VoteSigner::new(
            self.config.sign_interval,
            self.chain_id.clone(),
            self.priv_validator.clone(),
            self.state.clone(),
            self.unsigned.clone(),
            self.gossip.clone(),
            vote_rx,
        );
        self.tracker.spawn(signer.run(self.shutdown.clone()));

        let unsigned_pruner = UnsignedVotePruner::new(
            self.state.clone(),
            self.unsigned.clone(),
            self.config.max_gossip_vote_age,
        );
        self.tracker.spawn(unsigned_pruner.run(self.shutdown.clone()));

        let gossip_pruner = GossipPruner::new(self.gossip.clone());
        self.tracker.spawn(gossip_pruner.run(self.shutdown.clone()));

        Ok(())
    }

    /// Signal every worker and wait for quiescence.
    pub async fn stop(&self) {
        info!("stopping oracle reactor");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("oracle reactor stopped");
    }

    /// Reserve a peer-id slot. Fails when the table is full.
    pub fn init_peer(&self, peer: &dyn Peer) -> Result<u16, ReactorError> {
        Ok(self.slots.reserve(peer.id())?)
    }

    /// Spawn the per-peer broadcaster.
    pub fn add_peer(&self, peer: Arc<dyn Peer>) {
        debug!(peer = %peer.id(), "adding peer");
        self.tracker.spawn(broadcast_votes_routine(
            peer,
            self.gossip.clone(),
            self.shutdown.clone(),
        ));
    }

    /// Release the peer's slot. Its broadcaster observes peer liveness and
    /// exits on its own.
    pub fn remove_peer(&self, peer: &dyn Peer) {
        debug!(peer = %peer.id(), "removing peer");
        self.slots.reclaim(peer.id());
    }

    /// Ingress for one envelope from a peer.
    ///
    /// `Err` means the peer sent traffic this reactor cannot handle and
    /// should be stopped by the switch; everything else is handled (or
    /// dropped) here.
    pub fn receive(&self, src: &dyn Peer, envelope: Envelope) -> Result<(), ReceiveError> {
        if envelope.channel_id != ORACLE_CHANNEL_ID {
            warn!(
                peer = %src.id(),
                channel_id = envelope.channel_id,
                "unknown message channel"
            );
            return Err(ReceiveError::UnknownChannel {
                channel_id: envelope.channel_id,
            });
        }

        metrics::record_batch_received();

        let batch = match decode_gossip_vote(&envelope.payload) {
            Ok(batch) => batch,
            Err(err) => {
                metrics::record_malformed_message();
                warn!(peer = %src.id(), error = %err, "dropping malformed gossip message");
                return Ok(());
            }
        };

        let scheme = match SignScheme::parse(&batch.sign_type) {
            Ok(scheme) => scheme,
            Err(err) => {
                metrics::record_signature_failure();
                warn!(peer = %src.id(), error = %err, "dropping batch with unsupported sign type");
                return Ok(());
            }
        };

        let pub_key = match PublicKey::from_bytes(scheme, &batch.pub_key) {
            Ok(pub_key) => pub_key,
            Err(err) => {
                metrics::record_malformed_message();
                warn!(peer = %src.id(), error = %err, "dropping batch with invalid public key");
                return Ok(());
            }
        };
        let address = pub_key.address().to_string();

        let message = sign_bytes(&batch, &self.chain_id);
        if !pub_key.verify(&message, &batch.signature) {
            metrics::record_signature_failure();
            warn!(peer = %src.id(), validator = %address, "failed signature verification");
            return Ok(());
        }

        // The signer is deliberately not cross-checked against the validator
        // set here, matching the deployed protocol. `self.state` holds the
        // set if that changes.
        match self.gossip.install(address.clone(), batch) {
            InstallOutcome::FirstEntry | InstallOutcome::Replaced => {
                metrics::record_batch_accepted();
                metrics::set_gossip_buffer_size(self.gossip.len());
                debug!(peer = %src.id(), validator = %address, "installed gossip batch");
            }
            InstallOutcome::Stale => {
                metrics::record_batch_stale();
            }
        }

        Ok(())
    }
}
