//! eoflow Core - Domain models, configuration, and port definitions
//!
//! This crate contains the types shared by every stage of tile materialization: the
//! dataset specification, revisit records, index records, the error taxonomy and the
//! byte-store port that storage adapters implement.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use config::DataSpec;
pub use error::{EoflowError, ErrorKind, Result};
