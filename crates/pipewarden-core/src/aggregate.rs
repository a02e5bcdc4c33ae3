//! Result aggregation across SCM platforms.
//!
//! One `RuleResult` exists per unique rule id per run: platform variants of
//! the same logical rule merge into it. Error lists concatenate as-is — they
//! were already deduplicated per platform.

use crate::model::ScmPlatform;
use crate::validator::SchemaError;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub rule_name: String,
    pub valid: bool,
    pub schema_errors: Vec<SchemaError>,
    pub failure_message: String,
}

/// Aggregate counters for the run summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputSummary {
    pub total_owners: usize,
    pub total_repositories: usize,
    pub total_pipelines: usize,
    pub total_rules_evaluated: usize,
    pub total_failed_rules: usize,
    /// Rule-customization URL, shown when running without entitlement.
    pub url: Option<String>,
}

pub type RuleResults = BTreeMap<u32, RuleResult>;

/// Merge one platform evaluation into the per-id results. A rule is valid
/// overall only if it is valid on every platform it was evaluated against.
pub fn merge_rule_result(
    results: &mut RuleResults,
    unique_id: u32,
    rule_name: &str,
    failure_message: &str,
    schema_errors: Vec<SchemaError>,
) {
    let valid = schema_errors.is_empty();
    match results.get_mut(&unique_id) {
        Some(existing) => {
            existing.schema_errors.extend(schema_errors);
            if !valid {
                existing.valid = false;
            }
        }
        None => {
            results.insert(
                unique_id,
                RuleResult {
                    rule_name: rule_name.to_string(),
                    valid,
                    schema_errors,
                    failure_message: failure_message.to_string(),
                },
            );
        }
    }
}

/// Reduce local-directory results: a single directory was speculatively
/// evaluated as both GitHub- and GitLab-shaped, so a failed rule keeps only
/// the platform variant that reported the most errors. Equal counts keep the
/// first platform in the fixed github -> gitlab order.
pub fn reduce_local_rule_results(results: RuleResults) -> RuleResults {
    results
        .into_iter()
        .map(|(unique_id, result)| {
            if result.valid {
                return (unique_id, result);
            }

            let mut errors_by_scm: BTreeMap<ScmPlatform, Vec<SchemaError>> = BTreeMap::new();
            for error in result.schema_errors {
                errors_by_scm
                    .entry(error.scm_platform)
                    .or_default()
                    .push(error);
            }

            let mut kept: Vec<SchemaError> = Vec::new();
            for scm in ScmPlatform::ALL {
                if let Some(errors) = errors_by_scm.remove(&scm) {
                    if errors.len() > kept.len() {
                        kept = errors;
                    }
                }
            }

            (
                unique_id,
                RuleResult {
                    rule_name: result.rule_name,
                    valid: false,
                    schema_errors: kept,
                    failure_message: result.failure_message,
                },
            )
        })
        .collect()
}
