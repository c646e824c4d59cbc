//! Core types for the relay.
//!
//! This module provides type-safe wrappers for Azure DevOps and chat-platform
//! domain concepts.

pub mod approval;
pub mod event;
pub mod id;

pub use approval::{ApprovalDecision, ApprovalKind, is_pending_status};
pub use event::{EventType, FilterBucket, Publisher, ServiceType};
pub use id::*;
