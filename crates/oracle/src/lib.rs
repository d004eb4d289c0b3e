//! The oracle job executor.
//!
//! Every 100 ms the executor walks the active oracle set and, for each
//! oracle whose current resolution window has not yet been handled, runs the
//! oracle's resolved job graph against the adapter registry. A KV-backed
//! `SETNX` lock guarantees that across a fleet of workers exactly one node
//! submits per `(oracle, window)` pair.
//!
//! The produced observation goes two ways: into the unsigned-vote channel
//! that feeds the gossip signer, and on-chain through the wallet as a
//! `MsgCreateVote` (fire-and-forget).
//!
//! External collaborators are trait seams: [`KvStore`] (Redis),
//! [`SpecProvider`] (the on-chain oracle list), and [`VoteSubmitter`] (the
//! wallet).

mod adapter;
pub mod adapters;
mod executor;
mod kv;
mod parser;
mod spec;
mod submit;
mod value;

pub use adapter::{Adapter, AdapterError, AdapterRegistry, AdapterResult, AdapterStore, RuntimeInput};
pub use executor::{
    overwrite_from_env, Executor, ExecutorConfig, ExecutorError, OracleDefinition, ProviderError,
    SpecProvider,
};
pub use kv::{
    adapter_store_key, oracle_lock_key, oracle_result_key, KvError, KvStore, MemoryKv, RedisKv,
    LAST_SUBMISSION_TIME_KEY,
};
pub use parser::{parse_spec, validate_jobs, SpecError};
pub use spec::{Oracle, OracleJob, OracleSpec};
pub use submit::{MsgCreateVote, SubmitError, VoteSubmitter};
pub use value::GenericValue;
