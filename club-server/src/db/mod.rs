//! Embedded document store
//!
//! - [`DocStore`] - redb-backed collections of JSON documents
//! - [`Transaction`] - optimistic read-validate-commit unit of work
//! - [`CommitEvent`] - change feed and live listener fan-out

pub mod live;
pub mod store;
pub mod transaction;

pub use live::{CommitEvent, DocChange};
pub use store::{CommitHook, DEFAULT_MAX_ATTEMPTS, DocStore, StoreError, StoreResult};
pub use transaction::Transaction;
