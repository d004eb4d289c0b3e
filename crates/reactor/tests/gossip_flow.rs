//! End-to-end tests for the gossip pipeline.
//!
//! These run two reactors against in-memory collaborators: votes enter
//! through the application surface (or the job executor), get signed and
//! installed locally, stream out through a per-peer broadcaster, and are
//! verified and installed on the receiving side.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tidemark_oracle::{
    Adapter, AdapterError, AdapterRegistry, AdapterResult, AdapterStore, ExecutorConfig, MemoryKv,
    MsgCreateVote, OracleDefinition, OracleJob, ProviderError, RuntimeInput, SpecProvider,
    SubmitError, VoteSubmitter,
};
use tidemark_reactor::{Envelope, OracleConfig, Peer, Reactor, StaticChainState};
use tidemark_types::{KeyPair, PrivValidator, SignScheme, ValidatorInfo, ValidatorSet};
use tidemark_wire::Vote;
use tracing::info;

const CHAIN_ID: &str = "tidemark-test-1";

struct EmptyProvider;

#[async_trait]
impl SpecProvider for EmptyProvider {
    async fn active_oracles(&self) -> Result<Vec<OracleDefinition>, ProviderError> {
        Ok(vec![])
    }
}

struct NullSubmitter;

#[async_trait]
impl VoteSubmitter for NullSubmitter {
    fn creator(&self) -> String {
        String::new()
    }

    async fn voting_power(&self) -> Result<i64, SubmitError> {
        Ok(0)
    }

    async fn submit_vote(&self, _msg: MsgCreateVote) -> Result<(), SubmitError> {
        Ok(())
    }
}

/// Captures everything the broadcaster sends.
struct CapturePeer {
    id: String,
    running: AtomicBool,
    received: Mutex<Vec<Envelope>>,
}

impl CapturePeer {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            running: AtomicBool::new(true),
            received: Mutex::new(Vec::new()),
        })
    }

    fn envelopes(&self) -> Vec<Envelope> {
        self.received.lock().clone()
    }
}

impl Peer for CapturePeer {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn try_send(&self, envelope: Envelope) -> bool {
        self.received.lock().push(envelope);
        true
    }
}

fn vote(oracle_id: &str, timestamp: i64, data: &str) -> Vote {
    Vote {
        validator: String::new(),
        oracle_id: oracle_id.to_string(),
        timestamp,
        data: data.to_string(),
    }
}

fn build_reactor(keypair: KeyPair, validators: ValidatorSet) -> Reactor {
    Reactor::builder()
        .config(OracleConfig::default())
        .chain_id(CHAIN_ID)
        .priv_validator(Arc::new(keypair))
        .chain_state(Arc::new(StaticChainState::new(validators)))
        .kv_store(Arc::new(MemoryKv::new()))
        .spec_provider(Arc::new(EmptyProvider))
        .vote_submitter(Arc::new(NullSubmitter))
        .build()
        .unwrap()
}

#[tokio::test]
async fn votes_travel_from_application_to_remote_buffer() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let key_a = KeyPair::generate(SignScheme::Ed25519);
    let key_b = KeyPair::generate(SignScheme::Sr25519);
    let addr_a = key_a.public_key().address().to_string();
    let validators = ValidatorSet::new(vec![
        ValidatorInfo::new(key_a.public_key(), 10),
        ValidatorInfo::new(key_b.public_key(), 10),
    ]);

    let reactor_a = build_reactor(key_a, validators.clone());
    let reactor_b = build_reactor(key_b, validators);

    reactor_a.start().unwrap();

    // Observations arrive from the application surface, out of order.
    let sender = reactor_a.vote_sender();
    sender.send(vote("ETH", 200, "1800.25")).unwrap();
    sender.send(vote("BTC", 100, "42000.5")).unwrap();

    // One signer tick is 100 ms; give it a few.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let own = reactor_a
        .gossip_buffer()
        .get(&addr_a)
        .expect("signer installed own batch");
    assert_eq!(own.votes.len(), 2);
    assert_eq!(own.votes[0].oracle_id, "BTC");

    // A connected peer receives the buffer contents.
    let peer = CapturePeer::new("peer-b");
    reactor_a.add_peer(peer.clone());
    tokio::time::sleep(Duration::from_millis(400)).await;
    let envelopes = peer.envelopes();
    assert!(!envelopes.is_empty(), "broadcaster sent the buffer");

    // The remote side verifies and installs.
    let src = CapturePeer::new("peer-a");
    reactor_b
        .receive(src.as_ref(), envelopes[0].clone())
        .unwrap();
    let remote = reactor_b
        .gossip_buffer()
        .get(&addr_a)
        .expect("remote installed the batch");
    assert_eq!(remote.votes.len(), 2);

    // A tampered copy is dropped without touching the stored entry.
    let mut tampered = envelopes[0].clone();
    let last = tampered.payload.len() - 1;
    tampered.payload[last] ^= 0x01;
    let _ = reactor_b.receive(src.as_ref(), tampered);
    assert_eq!(
        reactor_b.gossip_buffer().get(&addr_a).unwrap().votes.len(),
        2
    );

    reactor_a.stop().await;
    reactor_b.stop().await;
    info!("gossip flow complete");
}

/// A source adapter yielding a fixed quote, standing in for HTTP fetchers.
struct FixedQuote;

#[async_trait]
impl Adapter for FixedQuote {
    fn id(&self) -> &'static str {
        "fixed_quote"
    }

    async fn perform(
        &self,
        job: &OracleJob,
        result: &mut AdapterResult,
        _input: &RuntimeInput,
        _store: &mut AdapterStore,
    ) -> Result<(), AdapterError> {
        result.set(&job.output_id, "42000.5".into());
        Ok(())
    }
}

struct OneOracleProvider;

#[async_trait]
impl SpecProvider for OneOracleProvider {
    async fn active_oracles(&self) -> Result<Vec<OracleDefinition>, ProviderError> {
        Ok(vec![OracleDefinition {
            id: "BTC".to_string(),
            resolution: 1,
            spec: r#"{
                "jobs": [{"adapter": "fixed_quote", "output_id": "price"}],
                "output_id": "price"
            }"#
            .to_string(),
        }])
    }
}

#[tokio::test]
async fn executor_observations_reach_the_gossip_buffer() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let keypair = KeyPair::generate(SignScheme::Ed25519);
    let address = keypair.public_key().address().to_string();
    let validators = ValidatorSet::new(vec![ValidatorInfo::new(keypair.public_key(), 10)]);

    let mut adapters = AdapterRegistry::standard();
    adapters.register(Arc::new(FixedQuote));

    let reactor = Reactor::builder()
        .config(OracleConfig::default())
        .chain_id(CHAIN_ID)
        .priv_validator(Arc::new(keypair))
        .chain_state(Arc::new(StaticChainState::new(validators)))
        .kv_store(Arc::new(MemoryKv::new()))
        .adapters(Arc::new(adapters))
        .spec_provider(Arc::new(OneOracleProvider))
        .vote_submitter(Arc::new(NullSubmitter))
        .executor_config(ExecutorConfig {
            tick_interval: Duration::from_millis(50),
            overwrite_data: false,
            ..ExecutorConfig::default()
        })
        .build()
        .unwrap();

    reactor.start().unwrap();

    // Executor sync + tick + signer tick.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let batch = reactor
        .gossip_buffer()
        .get(&address)
        .expect("executor observation was signed into the buffer");
    // One observation per elapsed resolution window.
    assert!(!batch.votes.is_empty());
    assert!(batch.votes.iter().all(|v| v.oracle_id == "BTC"));
    assert!(batch.votes.iter().all(|v| v.data == "42000.5"));

    reactor.stop().await;
}
