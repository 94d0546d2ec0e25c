//! Infrastructure Services
//!
//! This module provides the core infrastructure services for the migration
//! engine:
//!
//! - **client**: tenant wire types, the `VaultAccount` seam, and the HTTP
//!   session client
//! - **bridge**: external credential-CLI fallback for custom items
//! - **retry**: bounded retry with exponential backoff for transient
//!   tenant failures
//! - **config**: migration run configuration
//! - **errors**: run-aborting error types

pub mod bridge;
pub mod client;
pub mod config;
pub mod errors;
pub mod retry;
