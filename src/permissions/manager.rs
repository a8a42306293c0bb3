//! Permission manager implementation
//!
//! Resolves tool requests against stored rules, falls back to one-time
//! decisions, and otherwise parks a request for the user to decide.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use super::origin::{normalize_permission_origin, RuntimeOrigin};
use super::rule::{select_rule, PermissionRule, Policy};
use crate::error::{PermissionError, PermissionResult};
use crate::storage::KeyValueStore;

/// Storage key holding the rule list
pub const DEFAULT_STORAGE_KEY: &str = "tool_permission_policies";

/// A pending request for the user to decide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    /// Unique id the decision must be applied against
    pub request_id: String,
    /// Name of the tool
    pub tool_name: String,
    /// Normalized origin of the request
    pub origin: String,
    /// When the request was created
    pub created_at: DateTime<Utc>,
}

impl PermissionRequest {
    /// Create a new permission request with a fresh id
    pub fn new(tool_name: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            origin: origin.into(),
            created_at: Utc::now(),
        }
    }

    fn is_for(&self, tool_name: &str, origin: &str) -> bool {
        self.tool_name == tool_name && self.origin == origin
    }
}

/// The user's decision on a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    /// Allow this one request
    AllowOnce,
    /// Deny this one request
    DenyOnce,
    /// Always allow this tool on this origin
    AllowAlways,
    /// Always deny this tool on this origin
    DenyAlways,
}

impl PermissionDecision {
    /// The policy this decision applies
    pub fn policy(self) -> Policy {
        match self {
            PermissionDecision::AllowOnce | PermissionDecision::AllowAlways => Policy::Allow,
            PermissionDecision::DenyOnce | PermissionDecision::DenyAlways => Policy::Deny,
        }
    }

    /// Whether the decision persists a rule
    pub fn is_persistent(self) -> bool {
        matches!(
            self,
            PermissionDecision::AllowAlways | PermissionDecision::DenyAlways
        )
    }
}

impl fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionDecision::AllowOnce => "allow_once",
            PermissionDecision::DenyOnce => "deny_once",
            PermissionDecision::AllowAlways => "allow_always",
            PermissionDecision::DenyAlways => "deny_always",
        };
        f.write_str(name)
    }
}

impl FromStr for PermissionDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow_once" => Ok(PermissionDecision::AllowOnce),
            "deny_once" => Ok(PermissionDecision::DenyOnce),
            "allow_always" => Ok(PermissionDecision::AllowAlways),
            "deny_always" => Ok(PermissionDecision::DenyAlways),
            other => Err(format!("unknown permission decision: {}", other)),
        }
    }
}

/// Result of evaluating a tool request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    /// The tool may run
    Allowed,
    /// The tool is blocked
    Denied,
    /// No rule applies; the caller must ask the user
    Request(PermissionRequest),
}

impl PermissionOutcome {
    fn from_policy(policy: Policy) -> Self {
        match policy {
            Policy::Allow => PermissionOutcome::Allowed,
            Policy::Deny => PermissionOutcome::Denied,
        }
    }

    /// Whether the tool may run
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionOutcome::Allowed)
    }

    /// Whether the tool was explicitly blocked
    pub fn is_denied(&self) -> bool {
        matches!(self, PermissionOutcome::Denied)
    }

    /// The pending request, if the user has to decide
    pub fn request(&self) -> Option<&PermissionRequest> {
        match self {
            PermissionOutcome::Request(request) => Some(request),
            _ => None,
        }
    }
}

// Serialized in the shape the extension bridge expects:
// {"allowed":true}, {"allowed":false,"denied":true}, {"allowed":false,"request":{..}}
impl Serialize for PermissionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            PermissionOutcome::Allowed => {
                map.serialize_entry("allowed", &true)?;
            }
            PermissionOutcome::Denied => {
                map.serialize_entry("allowed", &false)?;
                map.serialize_entry("denied", &true)?;
            }
            PermissionOutcome::Request(request) => {
                map.serialize_entry("allowed", &false)?;
                map.serialize_entry("request", request)?;
            }
        }
        map.end()
    }
}

/// Manages tool permissions for origins
///
/// Rules live in the key-value store and are re-read on every evaluation.
/// Pending requests and one-time decisions only live in memory.
pub struct PermissionManager<S> {
    store: S,
    storage_key: String,
    /// Live requests by id, with their creation sequence number
    pending: HashMap<String, (u64, PermissionRequest)>,
    next_sequence: u64,
    /// One-shot outcomes keyed by (tool, origin)
    one_time: HashMap<(String, String), Policy>,
}

/// Trim a tool name; empty names are rejected
fn normalize_tool_name(tool_name: &str) -> PermissionResult<&str> {
    let trimmed = tool_name.trim();
    if trimmed.is_empty() {
        return Err(PermissionError::InvalidToolName(tool_name.to_string()));
    }
    Ok(trimmed)
}

impl<S: KeyValueStore> PermissionManager<S> {
    /// Create a new permission manager over a store
    pub fn new(store: S) -> Self {
        Self {
            store,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            pending: HashMap::new(),
            next_sequence: 0,
            one_time: HashMap::new(),
        }
    }

    /// Use a custom storage key for the rule list
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Get the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decide whether `tool_name` may run for the page at `origin`
    ///
    /// `origin` may be a full URL; only its origin is used. An origin that
    /// cannot be normalized never matches a rule. An empty tool name is
    /// rejected before any request is created.
    pub async fn evaluate_tool_permission(
        &mut self,
        tool_name: &str,
        origin: &str,
    ) -> PermissionResult<PermissionOutcome> {
        let tool_name = normalize_tool_name(tool_name)?;
        let runtime = RuntimeOrigin::parse(origin);

        match &runtime {
            Some(runtime) => {
                let rules = self.load_rules().await?;
                if let Some((rule, specificity)) = select_rule(&rules, tool_name, runtime) {
                    tracing::debug!(
                        "Rule {} @ {} ({:?}) decides {} for {} @ {}",
                        rule.tool_pattern,
                        rule.origin_pattern,
                        specificity,
                        rule.policy,
                        tool_name,
                        runtime.origin
                    );
                    return Ok(PermissionOutcome::from_policy(rule.policy));
                }
            }
            None => {
                tracing::warn!("Cannot normalize request origin '{}'; no rule applies", origin);
            }
        }

        let origin = runtime
            .map(|runtime| runtime.origin)
            .unwrap_or_else(|| origin.trim().to_string());
        let key = (tool_name.to_string(), origin);

        if let Some(policy) = self.one_time.remove(&key) {
            tracing::info!("Consumed one-time {} for {} @ {}", policy, key.0, key.1);
            return Ok(PermissionOutcome::from_policy(policy));
        }

        let (tool_name, origin) = key;
        self.pending
            .retain(|_, (_, request)| !request.is_for(&tool_name, &origin));
        let request = PermissionRequest::new(tool_name, origin);
        tracing::info!(
            "Permission request {} for {} @ {}",
            request.request_id,
            request.tool_name,
            request.origin
        );
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending
            .insert(request.request_id.clone(), (sequence, request.clone()));

        Ok(PermissionOutcome::Request(request))
    }

    /// Apply the user's decision to a pending request
    ///
    /// Unknown or superseded ids are ignored. An `*_always` decision for an
    /// origin that cannot be stored as a rule is kept as a one-time decision.
    pub async fn apply_tool_permission_decision(
        &mut self,
        request_id: &str,
        decision: PermissionDecision,
    ) -> PermissionResult<()> {
        let Some((_, request)) = self.pending.remove(request_id) else {
            tracing::debug!("Ignoring {} for stale request {}", decision, request_id);
            return Ok(());
        };

        tracing::info!(
            "Applying {} to {} @ {}",
            decision,
            request.tool_name,
            request.origin
        );

        let persist = decision.is_persistent() && normalize_permission_origin(&request.origin).is_some();
        if decision.is_persistent() && !persist {
            tracing::warn!(
                "Origin '{}' cannot be stored; keeping {} as one-time",
                request.origin,
                decision
            );
        }

        if persist {
            self.upsert_tool_permission_policy(&request.tool_name, &request.origin, decision.policy())
                .await?;
        } else {
            self.one_time
                .insert((request.tool_name, request.origin), decision.policy());
        }

        Ok(())
    }

    /// Store a rule, replacing any rule with the same tool and origin
    ///
    /// The written rule becomes the most recent one.
    pub async fn upsert_tool_permission_policy(
        &self,
        tool_name: &str,
        origin: &str,
        policy: Policy,
    ) -> PermissionResult<PermissionRule> {
        let tool_name = normalize_tool_name(tool_name)?;
        let origin_pattern = normalize_permission_origin(origin)
            .ok_or_else(|| PermissionError::InvalidOrigin(origin.to_string()))?;

        let mut rules = self.load_rules().await?;
        rules.retain(|rule| !rule.has_key(tool_name, &origin_pattern));
        let rule = PermissionRule::new(tool_name, origin_pattern, policy);
        rules.push(rule.clone());
        self.save_rules(&rules).await?;

        tracing::info!(
            "Stored rule {} @ {} = {}",
            rule.tool_pattern,
            rule.origin_pattern,
            rule.policy
        );
        Ok(rule)
    }

    /// Remove the rule stored for a tool and origin
    ///
    /// Returns whether a rule was removed.
    pub async fn delete_tool_permission_policy(
        &self,
        tool_name: &str,
        origin: &str,
    ) -> PermissionResult<bool> {
        let origin_pattern = normalize_permission_origin(origin)
            .ok_or_else(|| PermissionError::InvalidOrigin(origin.to_string()))?;
        let tool_name = normalize_tool_name(tool_name)?;

        let mut rules = self.load_rules().await?;
        let before = rules.len();
        rules.retain(|rule| !rule.has_key(tool_name, &origin_pattern));
        if rules.len() == before {
            return Ok(false);
        }

        self.save_rules(&rules).await?;
        tracing::info!("Removed rule {} @ {}", tool_name, origin_pattern);
        Ok(true)
    }

    /// All stored rules, oldest first
    pub async fn list_tool_permission_policies(&self) -> PermissionResult<Vec<PermissionRule>> {
        self.load_rules().await
    }

    /// Requests still waiting for a decision, oldest first
    pub fn pending_requests(&self) -> Vec<&PermissionRequest> {
        let mut requests: Vec<_> = self.pending.values().collect();
        requests.sort_by_key(|(sequence, _)| *sequence);
        requests.into_iter().map(|(_, request)| request).collect()
    }

    /// Drop every pending request and unused one-time decision
    pub fn clear_session_decisions(&mut self) {
        self.pending.clear();
        self.one_time.clear();
    }

    async fn load_rules(&self) -> PermissionResult<Vec<PermissionRule>> {
        match self.store.get(&self.storage_key).await? {
            Some(serde_json::Value::Null) | None => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    async fn save_rules(&self, rules: &[PermissionRule]) -> PermissionResult<()> {
        let value = serde_json::to_value(rules)?;
        self.store.set(&self.storage_key, value).await
    }
}
