//! Thoughtlink Core - data model, configuration, wire protocol, and error handling

pub mod config;
pub mod error;
pub mod hash;
pub mod protocol;
pub mod types;

pub use config::{ContributionLevel, FilterSensitivity, ShareConfig};
pub use error::{Error, Result};
pub use protocol::*;
pub use types::*;
