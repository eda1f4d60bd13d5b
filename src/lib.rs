//! Splitcast - monorepo split publisher
//!
//! Mirrors a monorepo into a throwaway workspace, rewrites configured
//! subdirectories into standalone histories and publishes them to their
//! satellite repositories, skipping pairs a persistent cache already
//! records as done.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod pool;
pub mod remote;
pub mod split;
pub mod sync;
pub mod workspace;

pub use error::{SplitcastError, SplitcastResult};
