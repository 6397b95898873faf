//! Thoughtlink Monitor - the observation side of the pipeline
//!
//! Page snapshots come in through a [`PageSubscription`], are debounced until the
//! page goes quiet, extracted, diffed against the stored cursor, filtered, and
//! handed to the sync client. Insights coming back go through the injector.

pub mod debounce;
pub mod filter;
pub mod injection;
pub mod monitor;
pub mod settings;
pub mod watcher;

pub use debounce::Quiescence;
pub use filter::{is_eligible, Priority, ThoughtFilter};
pub use injection::{run_injector, DedupInjector, FileInjector, InsightSink};
pub use monitor::{delta_start, ConversationMonitor, DeltaReport, MonitorConfig, MonitorStats, ThoughtSink};
pub use settings::AgentSettings;
pub use watcher::{PageSubscription, PageWatcher};
