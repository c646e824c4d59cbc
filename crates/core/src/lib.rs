//! DevOps Relay Core - Shared types library.
//!
//! This crate provides common types used across all relay components:
//! - `relay` - The webhook relay service between Azure DevOps and Mattermost
//! - `cli` - Command-line tools for migrations and secrets
//!
//! # Architecture
//!
//! The core crate contains only types and lookup tables - no I/O, no key-value
//! access, no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Event types, publishers, service types, approval decisions and ids

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
