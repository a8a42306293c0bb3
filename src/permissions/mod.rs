//! Permission system for browser tool execution
//!
//! Decides whether a tool may run for a page origin. Rules pair a tool
//! pattern with an origin pattern; the most specific matching rule wins.
//! When nothing matches, a one-time decision is consumed if the user gave
//! one, otherwise a [`PermissionRequest`] is returned for the caller to put
//! in front of the user.

mod manager;
mod origin;
mod rule;

pub use manager::{
    PermissionDecision, PermissionManager, PermissionOutcome, PermissionRequest,
    DEFAULT_STORAGE_KEY,
};
pub use origin::{
    normalize_permission_origin, normalize_runtime_permission_origin, RuntimeOrigin, ANY_ORIGIN,
};
pub use rule::{select_rule, PermissionRule, Policy, Specificity, ANY_TOOL};
