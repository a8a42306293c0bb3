//! Tool permission resolver for a browser-extension bridge
//!
//! Decides whether a named tool may act on a page, based on stored
//! per-origin rules, one-time user decisions, and interactive requests.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod permissions;
pub mod storage;

pub use config::GateConfig;
pub use error::{PermissionError, PermissionResult};
pub use permissions::{
    PermissionDecision, PermissionManager, PermissionOutcome, PermissionRequest, PermissionRule,
    Policy,
};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
