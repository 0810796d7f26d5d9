//! # DriftSync Store
//!
//! Local data model and sync bookkeeping for the DriftSync replication
//! engine: posts, likes and comments with soft-delete tombstones, the
//! `is_synced` flag, and the pull watermark.
//!
//! This crate ships an in-memory, single-writer reference implementation of
//! the store contract the engine assumes: primary-key lookup, predicate
//! queries, atomic multi-record transactions, and a change feed that fires
//! after every commit. A production deployment substitutes the platform's
//! embedded database behind the same surface; encryption-at-rest of the
//! store file is that collaborator's concern, not this crate's.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod error;
mod id;
mod record;
mod store;
mod transaction;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeType, EntityKind};
pub use error::{StoreError, StoreResult};
pub use id::RecordId;
pub use record::{Comment, Like, MediaKind, Post, SystemSettings};
pub use store::LocalStore;
pub use transaction::WriteTxn;

/// Version of the local schema (posts, likes, comments, system settings).
pub const SCHEMA_VERSION: u32 = 7;
