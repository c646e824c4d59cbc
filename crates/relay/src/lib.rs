//! DevOps Relay library.
//!
//! The relay registers Azure DevOps service hooks on behalf of Mattermost
//! channels, verifies and renders the deliveries into channel posts, and
//! drives pipeline approvals from post buttons. The crate is a library so
//! that the binary, the CLI and the integration tests share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod chat;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod devops;
pub mod error;
pub mod kv;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
