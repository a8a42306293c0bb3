//! Permission rules and most-specific-wins matching

use std::cmp::Reverse;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::origin::{RuntimeOrigin, ANY_ORIGIN};

/// Tool pattern that matches every tool
pub const ANY_TOOL: &str = "*";

/// Outcome a rule applies when it wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Allow,
    Deny,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Allow => write!(f, "allow"),
            Policy::Deny => write!(f, "deny"),
        }
    }
}

/// How specifically a rule matched a request, most specific first
///
/// The derived ordering is the ranking: a smaller value wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Specificity {
    ExactToolExactOrigin,
    ExactToolWildcardOrigin,
    WildcardToolExactOrigin,
    WildcardToolWildcardOrigin,
}

impl Specificity {
    fn from_parts(tool: PatternMatch, origin: PatternMatch) -> Self {
        match (tool, origin) {
            (PatternMatch::Exact, PatternMatch::Exact) => Specificity::ExactToolExactOrigin,
            (PatternMatch::Exact, PatternMatch::Wildcard) => Specificity::ExactToolWildcardOrigin,
            (PatternMatch::Wildcard, PatternMatch::Exact) => Specificity::WildcardToolExactOrigin,
            (PatternMatch::Wildcard, PatternMatch::Wildcard) => {
                Specificity::WildcardToolWildcardOrigin
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternMatch {
    Exact,
    Wildcard,
}

/// A stored permission rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRule {
    /// Exact tool name, `namespace:*`, bare `namespace`, or `*`
    pub tool_pattern: String,
    /// Normalized origin or origin wildcard
    pub origin_pattern: String,
    /// Whether to allow or deny
    pub policy: Policy,
    /// When the rule was last written
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl PermissionRule {
    /// Create a new rule stamped with the current time
    ///
    /// The origin pattern is stored as given; callers normalize it first.
    pub fn new(tool_pattern: impl Into<String>, origin_pattern: impl Into<String>, policy: Policy) -> Self {
        Self {
            tool_pattern: tool_pattern.into(),
            origin_pattern: origin_pattern.into(),
            policy,
            updated_at: Utc::now(),
        }
    }

    /// Whether this rule is stored under the given `(tool, origin)` key
    pub fn has_key(&self, tool_pattern: &str, origin_pattern: &str) -> bool {
        self.tool_pattern == tool_pattern && self.origin_pattern == origin_pattern
    }

    /// How specifically this rule matches a request, or `None` if it doesn't
    pub fn specificity_for(&self, tool_name: &str, origin: &RuntimeOrigin) -> Option<Specificity> {
        let tool = match_tool(&self.tool_pattern, tool_name)?;
        let origin = match_origin(&self.origin_pattern, origin)?;
        Some(Specificity::from_parts(tool, origin))
    }
}

/// Pick the winning rule for a request
///
/// Most specific match wins; among equally specific matches the rule stored
/// last wins.
pub fn select_rule<'a>(
    rules: &'a [PermissionRule],
    tool_name: &str,
    origin: &RuntimeOrigin,
) -> Option<(&'a PermissionRule, Specificity)> {
    rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| {
            rule.specificity_for(tool_name, origin)
                .map(|specificity| (index, rule, specificity))
        })
        .min_by_key(|(index, _, specificity)| (*specificity, Reverse(*index)))
        .map(|(_, rule, specificity)| (rule, specificity))
}

fn match_tool(pattern: &str, tool_name: &str) -> Option<PatternMatch> {
    if pattern == tool_name {
        return Some(PatternMatch::Exact);
    }
    if pattern == ANY_TOOL {
        return Some(PatternMatch::Wildcard);
    }

    // `ns:*` and the legacy bare `ns` both cover every tool in `ns`
    let namespace = match pattern.strip_suffix(":*") {
        Some(namespace) => namespace,
        None if !pattern.contains(':') => pattern,
        None => return None,
    };
    let in_namespace = tool_name
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'));
    in_namespace.then_some(PatternMatch::Wildcard)
}

fn match_origin(pattern: &str, origin: &RuntimeOrigin) -> Option<PatternMatch> {
    if pattern == ANY_ORIGIN {
        return Some(PatternMatch::Wildcard);
    }

    let (scheme, host) = match pattern.split_once("://") {
        Some((scheme, host)) => (Some(scheme), host),
        None => (None, pattern),
    };

    if host == ANY_ORIGIN {
        return (scheme == Some(origin.scheme.as_str())).then_some(PatternMatch::Wildcard);
    }

    if let Some(domain) = host.strip_prefix("*.") {
        let scheme_matches = scheme.map_or(true, |scheme| scheme == origin.scheme);
        let host_matches = origin.host == domain
            || origin
                .host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'));
        return (scheme_matches && host_matches).then_some(PatternMatch::Wildcard);
    }

    (pattern == origin.origin).then_some(PatternMatch::Exact)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(url: &str) -> RuntimeOrigin {
        RuntimeOrigin::parse(url).unwrap()
    }

    #[test]
    fn test_tool_patterns() {
        assert_eq!(match_tool("tab_action:click", "tab_action:click"), Some(PatternMatch::Exact));
        assert_eq!(match_tool("tab_action:*", "tab_action:click"), Some(PatternMatch::Wildcard));
        assert_eq!(match_tool("tab_action", "tab_action:scroll"), Some(PatternMatch::Wildcard));
        assert_eq!(match_tool("*", "tab_read"), Some(PatternMatch::Wildcard));
        assert_eq!(match_tool("tab_action:click", "tab_action:scroll"), None);
        assert_eq!(match_tool("tab_action:*", "tab_actions:click"), None);
        assert_eq!(match_tool("tab", "tab_action:click"), None);
    }

    #[test]
    fn test_bare_tool_name_is_exact() {
        assert_eq!(match_tool("tab_read", "tab_read"), Some(PatternMatch::Exact));
    }

    #[test]
    fn test_origin_patterns() {
        let page = origin("https://docs.example.com/guide");
        assert_eq!(match_origin("*", &page), Some(PatternMatch::Wildcard));
        assert_eq!(match_origin("https://*", &page), Some(PatternMatch::Wildcard));
        assert_eq!(match_origin("http://*", &page), None);
        assert_eq!(match_origin("*.example.com", &page), Some(PatternMatch::Wildcard));
        assert_eq!(match_origin("https://*.example.com", &page), Some(PatternMatch::Wildcard));
        assert_eq!(match_origin("http://*.example.com", &page), None);
        assert_eq!(match_origin("https://docs.example.com", &page), Some(PatternMatch::Exact));
        assert_eq!(match_origin("https://example.com", &page), None);
    }

    #[test]
    fn test_host_wildcard_covers_apex_but_not_lookalikes() {
        assert!(match_origin("*.example.com", &origin("https://example.com")).is_some());
        assert!(match_origin("*.example.com", &origin("https://badexample.com")).is_none());
    }

    #[test]
    fn test_specificity_ordering() {
        assert!(Specificity::ExactToolExactOrigin < Specificity::ExactToolWildcardOrigin);
        assert!(Specificity::ExactToolWildcardOrigin < Specificity::WildcardToolExactOrigin);
        assert!(Specificity::WildcardToolExactOrigin < Specificity::WildcardToolWildcardOrigin);
    }

    #[test]
    fn test_select_most_specific() {
        let rules = vec![
            PermissionRule::new("tab_action:*", "*", Policy::Allow),
            PermissionRule::new("tab_action:click", "https://*", Policy::Allow),
            PermissionRule::new("tab_action:click", "https://deces.matchid.io", Policy::Deny),
        ];

        let (rule, specificity) =
            select_rule(&rules, "tab_action:click", &origin("https://deces.matchid.io/recherche")).unwrap();
        assert_eq!(rule.policy, Policy::Deny);
        assert_eq!(specificity, Specificity::ExactToolExactOrigin);

        let (rule, specificity) =
            select_rule(&rules, "tab_action:click", &origin("https://example.com/page")).unwrap();
        assert_eq!(rule.policy, Policy::Allow);
        assert_eq!(specificity, Specificity::ExactToolWildcardOrigin);

        let (_, specificity) =
            select_rule(&rules, "tab_action:scroll", &origin("https://example.com/page")).unwrap();
        assert_eq!(specificity, Specificity::WildcardToolWildcardOrigin);

        assert!(select_rule(&rules, "tab_read", &origin("https://example.com")).is_none());
    }

    #[test]
    fn test_wildcard_tool_exact_origin_beats_full_wildcard() {
        let rules = vec![
            PermissionRule::new("tab_action:*", "https://bank.example", Policy::Deny),
            PermissionRule::new("*", "*", Policy::Allow),
        ];
        let (rule, specificity) =
            select_rule(&rules, "tab_action:type", &origin("https://bank.example/login")).unwrap();
        assert_eq!(rule.policy, Policy::Deny);
        assert_eq!(specificity, Specificity::WildcardToolExactOrigin);
    }

    #[test]
    fn test_later_rule_wins_tie() {
        let rules = vec![
            PermissionRule::new("tab_action:*", "https://*", Policy::Deny),
            PermissionRule::new("tab_action", "*.example.com", Policy::Allow),
        ];
        let (rule, _) = select_rule(&rules, "tab_action:click", &origin("https://example.com")).unwrap();
        assert_eq!(rule.policy, Policy::Allow);
    }

    #[test]
    fn test_rule_serializes_camel_case() {
        let rule = PermissionRule::new("tab_action:*", "*", Policy::Deny);
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["toolPattern"], "tab_action:*");
        assert_eq!(json["originPattern"], "*");
        assert_eq!(json["policy"], "deny");
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_rule_without_timestamp_deserializes() {
        let rule: PermissionRule = serde_json::from_value(serde_json::json!({
            "toolPattern": "tab_read",
            "originPattern": "https://example.com",
            "policy": "allow"
        }))
        .unwrap();
        assert_eq!(rule.policy, Policy::Allow);
    }
}
