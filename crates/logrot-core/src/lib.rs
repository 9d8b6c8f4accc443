//! logrot Core - Shared types, configuration, path naming and error handling

pub mod config;
pub mod constants;
pub mod error;
pub mod fs;
pub mod naming;
pub mod types;

pub use config::*;
pub use constants::*;
pub use error::{Error, Result};
pub use naming::PathNamer;
pub use types::*;
