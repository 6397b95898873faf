//! Thoughtlink Adapters - per-platform conversation extraction
//!
//! Each supported chat site is a `PlatformProfile` (pure data: selectors and
//! attribute names). `SelectorAdapter` interprets a profile against an HTML
//! snapshot. The `AdapterRegistry` maps a page origin to an adapter through an
//! ordered hostname pattern table; unmatched origins get the inert adapter.

pub mod adapter;
pub mod profiles;
pub mod registry;
pub mod selector;

pub use adapter::{InertAdapter, PageSnapshot, PlatformAdapter};
pub use profiles::{PlatformProfile, RoleRule, DEFAULT_ROUTES};
pub use registry::AdapterRegistry;
pub use selector::SelectorAdapter;
