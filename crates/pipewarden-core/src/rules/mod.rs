//! Rule catalog: built-in rule definitions and per-run loading.
//!
//! Built-in rules are embedded in the binary and synced into the config home
//! on every run, one directory per SCM platform. A `custom/` subdirectory may
//! hold user-authored rules; their ids are offset by
//! [`CUSTOM_RULE_ID_OFFSET`] at load time, which both disambiguates them from
//! built-ins and marks them as always evaluated regardless of entitlement.

use crate::config::ConfigStore;
use crate::error::ScanError;
use crate::model::ScmPlatform;
use serde::{Deserialize, Serialize};

/// Ids below the offset are built-in; remapped custom rules land at or above
/// it. Enforced at load time, not stored in the rule files.
pub const CUSTOM_RULE_ID_OFFSET: u32 = 1000;

/// A single compliance rule, either a JSON Schema over the normalized tree
/// or a marker for a procedural detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unique_id: u32,
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
    #[serde(default)]
    pub failure_message: String,
    #[serde(default)]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub in_code_implementation: bool,
}

impl Rule {
    pub fn is_custom(&self) -> bool {
        self.unique_id >= CUSTOM_RULE_ID_OFFSET
    }

    /// Structural validation: `uniqueId` and `failureMessage` are mandatory,
    /// and a rule needs a schema unless it is procedurally implemented.
    pub fn validate_structure(&self, name: &str) -> Result<(), ScanError> {
        let mut missing = Vec::new();
        if self.unique_id == 0 {
            missing.push("uniqueId");
        }
        if self.failure_message.is_empty() {
            missing.push("failureMessage");
        }
        if self.schema.is_none() && !self.in_code_implementation {
            missing.push("schema");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ScanError::InvalidRule {
                name: name.to_string(),
                reason: format!("missing required field(s): {}", missing.join(", ")),
            })
        }
    }
}

const GITHUB_DEFAULT_RULES: &[(&str, &str)] = &[
    (
        "1-ensure-pipeline-exists.json",
        include_str!("defaults/github/1-ensure-pipeline-exists.json"),
    ),
    (
        "10-ensure-sca-scanner.json",
        include_str!("defaults/github/10-ensure-sca-scanner.json"),
    ),
    (
        "11-ensure-iac-scanner.json",
        include_str!("defaults/github/11-ensure-iac-scanner.json"),
    ),
    (
        "14-ensure-code-coverage.json",
        include_str!("defaults/github/14-ensure-code-coverage.json"),
    ),
    (
        "15-ensure-secrets-scanner.json",
        include_str!("defaults/github/15-ensure-secrets-scanner.json"),
    ),
    (
        "16-ensure-linter.json",
        include_str!("defaults/github/16-ensure-linter.json"),
    ),
    (
        "17-ensure-code-quality.json",
        include_str!("defaults/github/17-ensure-code-quality.json"),
    ),
];

const GITLAB_DEFAULT_RULES: &[(&str, &str)] = &[
    (
        "1-ensure-pipeline-exists.json",
        include_str!("defaults/gitlab/1-ensure-pipeline-exists.json"),
    ),
    (
        "10-ensure-sca-scanner.json",
        include_str!("defaults/gitlab/10-ensure-sca-scanner.json"),
    ),
    (
        "11-ensure-iac-scanner.json",
        include_str!("defaults/gitlab/11-ensure-iac-scanner.json"),
    ),
    (
        "14-ensure-code-coverage.json",
        include_str!("defaults/gitlab/14-ensure-code-coverage.json"),
    ),
    (
        "15-ensure-secrets-scanner.json",
        include_str!("defaults/gitlab/15-ensure-secrets-scanner.json"),
    ),
    (
        "16-ensure-linter.json",
        include_str!("defaults/gitlab/16-ensure-linter.json"),
    ),
    (
        "17-ensure-code-quality.json",
        include_str!("defaults/gitlab/17-ensure-code-quality.json"),
    ),
];

fn default_rules_for(scm: ScmPlatform) -> &'static [(&'static str, &'static str)] {
    match scm {
        ScmPlatform::Github => GITHUB_DEFAULT_RULES,
        ScmPlatform::Gitlab => GITLAB_DEFAULT_RULES,
    }
}

/// Filesystem-backed rule catalog rooted at the config home.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    store: ConfigStore,
}

impl RuleCatalog {
    pub fn new(store: ConfigStore) -> RuleCatalog {
        RuleCatalog { store }
    }

    /// Sync embedded built-in rules into the home rules directories.
    pub fn sync_defaults(&self) -> Result<(), ScanError> {
        for scm in ScmPlatform::ALL {
            self.store.sync_rules(scm, default_rules_for(scm))?;
        }
        Ok(())
    }

    /// All loadable rule names for one SCM platform, in catalog order.
    /// Custom rules are listed as `custom/<name>`.
    pub fn rule_names(&self, scm: ScmPlatform) -> Vec<String> {
        let dir = self.store.rules_dir(scm);
        let mut names = list_json_stems(&dir);
        names.sort_by_key(|name| (leading_id(name), name.clone()));

        let mut custom = list_json_stems(&dir.join("custom"));
        custom.sort_by_key(|name| (leading_id(name), name.clone()));
        names.extend(custom.into_iter().map(|n| format!("custom/{n}")));

        names
    }

    /// Load one rule by name. Custom rule ids are remapped by the fixed
    /// offset; a structurally invalid rule is an error for that rule only.
    pub fn get_rule(&self, name: &str, scm: ScmPlatform) -> Result<Rule, ScanError> {
        let path = self.store.rules_dir(scm).join(format!("{name}.json"));
        let content = std::fs::read_to_string(&path).map_err(|source| ScanError::RuleIo {
            path: path.display().to_string(),
            source,
        })?;
        let mut rule: Rule =
            serde_json::from_str(&content).map_err(|e| ScanError::InvalidRule {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        if name.starts_with("custom/") {
            rule.unique_id += CUSTOM_RULE_ID_OFFSET;
        }

        rule.validate_structure(name)?;
        Ok(rule)
    }
}

fn list_json_stems(dir: &std::path::Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| e.path().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.strip_suffix(".json").map(str::to_string)
        })
        .collect()
}

/// Numeric filename prefix (`10-ensure-sca-scanner` -> 10), for stable
/// catalog ordering.
fn leading_id(name: &str) -> u32 {
    name.split('-')
        .next()
        .and_then(|part| part.parse().ok())
        .unwrap_or(u32::MAX)
}
