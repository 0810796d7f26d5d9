//! # DriftSync Protocol
//!
//! Wire types for the remote relational store and its object buckets.
//!
//! Rows travel as snake_case JSON with RFC 3339 timestamps. Every remote
//! write is an upsert keyed on the client-minted record id, so re-sending a
//! row is idempotent by construction. The `updated_at` column is maintained
//! by the server for conflict resolution; clients read it but never write it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod query;
mod rows;

pub use query::WatermarkQuery;
pub use rows::{CommentRow, LikeRow, PostRow};

/// Remote table holding post metadata.
pub const POSTS_TABLE: &str = "posts";
/// Remote table holding likes.
pub const LIKES_TABLE: &str = "likes";
/// Remote table holding comments.
pub const COMMENTS_TABLE: &str = "comments";
