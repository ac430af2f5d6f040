//! Club Client - realtime views over the club document store
//!
//! Keeps a local, typed copy of a collection query or a single document in
//! sync with a [`LiveSource`](shared::store::LiveSource), retrying transient
//! listener failures with capped exponential backoff. Also tracks overall
//! connection health and offers an optimistic-update helper.

pub mod backoff;
pub mod connection;
pub mod error;
pub mod optimistic;
pub mod scheduler;
pub mod subscription;

pub use backoff::Backoff;
pub use connection::{ConnectionMonitor, ConnectionStatus, NetworkControl, ReconnectOptions};
pub use error::{ClientError, ClientResult};
pub use optimistic::{Optimistic, optimistic_update};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};
pub use subscription::{
    CollectionSubscription, DocumentSubscription, Record, SubscriptionOptions, SubscriptionState,
    subscribe_collection, subscribe_document,
};

// Re-export store types used to build targets
pub use shared::store::{Direction, Filter, FilterOp, LiveSource, Query};
