//! Rule selection: which rule ids run, derived from the entitlement token.
//!
//! The token is opaque base64-encoded JSON. Index `i` of its `rules` boolean
//! list corresponds to built-in rule id `i + 1`. Custom rules (offset ids)
//! are user-authored, not licensable, and always active. No token at all is
//! the anonymous path — enabled-by-default rules only — and is distinct from
//! a malformed token, which is a hard error with remediation guidance.

use crate::config::{ConfigStore, TOKEN_GENERATION_URL};
use crate::error::ScanError;
use crate::rules::Rule;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Deserialize)]
pub struct DecodedToken {
    #[serde(default)]
    pub rules: Vec<bool>,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "uniqueId", default)]
    pub unique_id: String,
}

/// Active-rule policy for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSelection {
    /// No token: rules flagged enabled-by-default run.
    Anonymous,
    /// Token present: exactly the licensed/selected built-in ids run.
    Entitled(BTreeSet<u32>),
}

impl RuleSelection {
    /// Whether a loaded rule participates in this run. Custom rules always do.
    pub fn is_active(&self, rule: &Rule) -> bool {
        if rule.is_custom() {
            return true;
        }
        match self {
            RuleSelection::Anonymous => rule.enabled_by_default,
            RuleSelection::Entitled(ids) => ids.contains(&rule.unique_id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, RuleSelection::Anonymous)
    }
}

/// Decode a raw token into its payload.
pub fn parse_token(raw: &str) -> Result<DecodedToken, ScanError> {
    let decode_error = || ScanError::TokenDecode {
        url: TOKEN_GENERATION_URL.to_string(),
    };
    let bytes = STANDARD.decode(raw.trim()).map_err(|_| decode_error())?;
    serde_json::from_slice(&bytes).map_err(|_| decode_error())
}

/// Resolve the run's rule selection from the config store.
///
/// `ignore_token` forces the anonymous path without touching the store.
pub fn resolve_selection(
    store: &ConfigStore,
    ignore_token: bool,
) -> Result<RuleSelection, ScanError> {
    if ignore_token {
        return Ok(RuleSelection::Anonymous);
    }
    let Some(raw) = store.get("token")? else {
        return Ok(RuleSelection::Anonymous);
    };
    let token = parse_token(&raw)?;
    Ok(RuleSelection::Entitled(selected_rule_ids(&token)))
}

fn selected_rule_ids(token: &DecodedToken) -> BTreeSet<u32> {
    token
        .rules
        .iter()
        .enumerate()
        .filter(|(_, selected)| **selected)
        .map(|(i, _)| i as u32 + 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(unique_id: u32, enabled_by_default: bool) -> Rule {
        Rule {
            description: String::new(),
            unique_id,
            schema: None,
            failure_message: "failed".to_string(),
            enabled_by_default,
            in_code_implementation: true,
        }
    }

    fn encode(json: &str) -> String {
        STANDARD.encode(json)
    }

    #[test]
    fn test_token_index_maps_to_rule_id() {
        let token = parse_token(&encode(
            r#"{"rules": [true, false, true], "email": "a@b.c", "uniqueId": "u1"}"#,
        ))
        .unwrap();
        let selection = RuleSelection::Entitled(selected_rule_ids(&token));

        assert!(selection.is_active(&rule(1, false)));
        assert!(!selection.is_active(&rule(2, true)));
        assert!(selection.is_active(&rule(3, false)));
        assert!(!selection.is_active(&rule(4, true)));
    }

    #[test]
    fn test_custom_rules_always_active() {
        let entitled = RuleSelection::Entitled(BTreeSet::new());
        assert!(entitled.is_active(&rule(1003, false)));
        assert!(RuleSelection::Anonymous.is_active(&rule(1003, false)));
    }

    #[test]
    fn test_anonymous_uses_default_flag() {
        assert!(RuleSelection::Anonymous.is_active(&rule(10, true)));
        assert!(!RuleSelection::Anonymous.is_active(&rule(11, false)));
    }

    #[test]
    fn test_malformed_base64_is_hard_error() {
        let err = parse_token("not//valid--base64!!").unwrap_err();
        assert!(matches!(err, ScanError::TokenDecode { .. }));
        assert!(err.to_string().contains("config clear token"));
    }

    #[test]
    fn test_valid_base64_invalid_json_is_hard_error() {
        let err = parse_token(&encode("not json")).unwrap_err();
        assert!(matches!(err, ScanError::TokenDecode { .. }));
    }

    #[test]
    fn test_missing_token_is_anonymous_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_home(tmp.path());
        let selection = resolve_selection(&store, false).unwrap();
        assert_eq!(selection, RuleSelection::Anonymous);
    }

    #[test]
    fn test_ignore_token_skips_malformed_token() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_home(tmp.path());
        store.set("token", "garbage").unwrap();

        assert!(resolve_selection(&store, false).is_err());
        assert_eq!(
            resolve_selection(&store, true).unwrap(),
            RuleSelection::Anonymous
        );
    }

    #[test]
    fn test_token_from_store_resolves_entitled() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_home(tmp.path());
        store
            .set("token", &encode(r#"{"rules": [true], "email": "", "uniqueId": ""}"#))
            .unwrap();
        let selection = resolve_selection(&store, false).unwrap();
        assert!(selection.is_active(&rule(1, false)));
        assert!(!selection.is_active(&rule(2, true)));
    }
}
