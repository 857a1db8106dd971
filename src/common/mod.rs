//! Common Infrastructure Module
//!
//! Shared error taxonomy for the relayer. Configuration (`crate::config`) and
//! logging (`crate::logging`) live at the crate root rather than nested here,
//! since both are consumed from `main.rs` before any other module is wired up.

pub mod error;

pub use error::{RelayerError, Result};
