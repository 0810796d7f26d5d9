//! # DriftSync Engine
//!
//! Offline-first bidirectional replication between the local store and a
//! remote relational store with object buckets.
//!
//! This crate provides:
//! - Dependency-ordered push of unsynced records plus binary media
//! - Watermarked pull with field-level conflict resolution
//! - Retention pruning (tombstone GC, size cap, orphan sweep)
//! - A scheduling envelope (cooldown, single-flight, connectivity trigger,
//!   background reactivation)
//!
//! Sync entry points never propagate errors to their callers: failures
//! surface through records staying unsynced and through logs, and the next
//! cycle retries from wherever this one stopped.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod http;
mod prune;
mod pull;
mod push;
mod remote;
mod resolver;
mod retry;
mod scheduler;
mod storage;
mod uploader;

pub use config::{EngineConfig, RetryPolicy};
pub use engine::{SyncEngine, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpObjectStorage, HttpRemote};
pub use prune::PruneOutcome;
pub use pull::PullOutcome;
pub use push::PushOutcome;
pub use remote::{MemoryRemote, RemoteStore};
pub use resolver::MediaPathResolver;
pub use retry::RetryExecutor;
pub use scheduler::{
    spawn_connectivity_listener, ConnectivityEvent, BACKGROUND_SYNC_TASK, MIN_BACKGROUND_INTERVAL,
};
pub use storage::{MemoryObjectStorage, ObjectStorage};
pub use uploader::MediaUploader;
