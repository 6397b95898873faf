//! Thoughtlink Store - durable local state
//!
//! Holds per-conversation cursors, the shared-thought ledger, the outbound
//! queue, the last connection state, and the sharing configuration in one
//! JSON document. Each field has exactly one writer:
//! - cursors: the conversation monitor
//! - ledger + queue + connection state: the sync client
//! - config: the settings surface
//!
//! Every mutation is a whole-document commit (write temp file, rename), so a
//! reader or a restarted process never sees a half-written record.

pub mod state;
pub mod store;

pub use state::{PersistedState, QueuedThought, STATE_FILE, STATE_VERSION};
pub use store::StateStore;
