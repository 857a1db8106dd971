//! Canonical Tree Service and one-shot initializer.

pub mod init;
pub mod service;

pub use init::TreeInitializer;
pub use service::{TreeError, TreeService};
