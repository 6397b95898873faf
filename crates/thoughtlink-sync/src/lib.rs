//! Thoughtlink Sync - delivery to the local collective service
//!
//! A durable-queue client with a connection state machine, jittered
//! exponential backoff, and a pluggable transport.

pub mod backoff;
pub mod client;
pub mod error;
pub mod machine;
pub mod mock;
pub mod transport;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use client::{Enqueued, SyncClient, SyncConfig, SyncHandle};
pub use error::{SyncError, SyncResult};
pub use machine::{ConnectionMachine, MachineEvent};
pub use mock::{AcceptPolicy, MockHandshake, MockTransport};
pub use transport::{CollectiveTransport, HttpTransport, InsightStream};
