//! Schema-based rule validation.
//!
//! A rule's JSON Schema runs against the entire per-platform tree; each raw
//! violation carries an instance path into that tree. Paths are mapped to
//! structured locations, deduplicated by their first five segments, and then
//! pruned so only the coarsest (lowest error level) violations remain — a
//! missing-at-owner-level failure subsumes the per-file failures beneath it.

use super::SchemaError;
use crate::error::ScanError;
use crate::model::{unescape_json_key, CiPlatform, ScmPlatform};
use crate::rules::Rule;
use serde_json::Value;
use std::collections::BTreeSet;

pub fn validate(
    rule_name: &str,
    rule: &Rule,
    scm: ScmPlatform,
    tree: &Value,
) -> Result<Vec<SchemaError>, ScanError> {
    let schema = rule.schema.as_ref().ok_or_else(|| ScanError::InvalidRule {
        name: rule_name.to_string(),
        reason: "schema rule has no schema".to_string(),
    })?;

    let validator =
        jsonschema::validator_for(schema).map_err(|e| ScanError::SchemaCompile {
            name: rule_name.to_string(),
            scm: scm.as_str().to_string(),
            reason: e.to_string(),
        })?;

    // Unique instance paths first; one field can violate several constraints.
    // `allOf` aggregate errors are skipped, their component failures are
    // reported individually anyway.
    let mut unique_fields: BTreeSet<String> = BTreeSet::new();
    for error in validator.iter_errors(tree) {
        let schema_path = error.schema_path.to_string();
        if schema_path.rsplit('/').next() == Some("allOf") {
            continue;
        }
        unique_fields.insert(error.instance_path.to_string());
    }

    let mut seen_truncated: BTreeSet<String> = BTreeSet::new();
    let mut lowest_level = u8::MAX;
    let mut errors: Vec<SchemaError> = Vec::new();

    for field in &unique_fields {
        let segments = pointer_segments(field);
        let truncated = segments
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(".");
        if !seen_truncated.insert(truncated) {
            continue;
        }

        let schema_error = parse_error_location(tree, scm, &segments);
        if schema_error.error_level < lowest_level {
            lowest_level = schema_error.error_level;
            errors = vec![schema_error];
        } else if schema_error.error_level == lowest_level {
            errors.push(schema_error);
        }
    }

    Ok(errors)
}

/// Split a JSON pointer (`/a/b/c`) into decoded segments. The root pointer
/// is the empty segment list.
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Map path segments onto the owner -> repo -> CI platform -> file hierarchy
/// with explicit bounds checks; the error level is the number of segments
/// that resolved.
fn parse_error_location(tree: &Value, scm: ScmPlatform, segments: &[String]) -> SchemaError {
    let mut error = SchemaError {
        owner_name: String::new(),
        repository_name: String::new(),
        ci_platform: None,
        pipeline_rel_path: String::new(),
        scm_platform: scm,
        error_level: 0,
    };

    if segments.is_empty() {
        return error;
    }
    error.owner_name = segments[0].clone();
    error.error_level = 1;

    if segments.len() < 3 {
        return error;
    }
    error.repository_name = segments[2].clone();
    error.error_level = 2;

    let Some(platform) = segments.get(3).and_then(|s| CiPlatform::from_tree_key(s)) else {
        return error;
    };
    error.ci_platform = Some(platform);
    error.error_level = 3;

    if segments.len() < 5 {
        return error;
    }
    let file_key = &segments[4];
    error.pipeline_rel_path = relative_path_of(tree, segments, file_key)
        .unwrap_or_else(|| unescape_json_key(file_key));
    error.error_level = 4;

    error
}

/// Look up the violating file's recorded relative path in the tree.
fn relative_path_of(tree: &Value, segments: &[String], file_key: &str) -> Option<String> {
    tree.get(&segments[0])?
        .get(&segments[1])?
        .get(&segments[2])?
        .get(&segments[3])?
        .get(file_key)?
        .get("relativePath")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pipeline_exists_rule() -> Rule {
        Rule {
            description: "workflow exists".to_string(),
            unique_id: 1,
            schema: Some(json!({
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "properties": {
                        "repositories": {
                            "type": "object",
                            "additionalProperties": {
                                "type": "object",
                                "properties": {
                                    "github-actions-workflows": {
                                        "type": "object",
                                        "minProperties": 1
                                    }
                                },
                                "required": ["github-actions-workflows"]
                            }
                        }
                    }
                }
            })),
            failure_message: "add a workflow".to_string(),
            enabled_by_default: true,
            in_code_implementation: false,
        }
    }

    fn tree_with_empty_and_missing_workflows() -> Value {
        json!({
            "acme": {
                "ownerName": "acme",
                "repositories": {
                    "bare": {
                        "name": "bare"
                    },
                    "empty": {
                        "name": "empty",
                        "github-actions-workflows": {}
                    }
                }
            }
        })
    }

    #[test]
    fn test_violations_keep_only_lowest_level() {
        let rule = pipeline_exists_rule();
        let tree = tree_with_empty_and_missing_workflows();
        let errors = validate("pipeline-exists", &rule, ScmPlatform::Github, &tree).unwrap();

        // "bare" fails at repository level (2); "empty" fails deeper at the
        // platform map (3). Only the coarser violation survives pruning.
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_level, 2);
        assert_eq!(errors[0].owner_name, "acme");
        assert_eq!(errors[0].repository_name, "bare");
    }

    #[test]
    fn test_all_errors_share_minimum_level() {
        let rule = pipeline_exists_rule();
        let tree = json!({
            "acme": {
                "repositories": {
                    "one": {"name": "one"},
                    "two": {"name": "two"}
                }
            }
        });
        let errors = validate("pipeline-exists", &rule, ScmPlatform::Github, &tree).unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.error_level == 2));
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let rule = pipeline_exists_rule();
        let tree = tree_with_empty_and_missing_workflows();
        let first = validate("pipeline-exists", &rule, ScmPlatform::Github, &tree).unwrap();
        let second = validate("pipeline-exists", &rule, ScmPlatform::Github, &tree).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_clean_tree_has_no_errors() {
        let rule = pipeline_exists_rule();
        let tree = json!({
            "acme": {
                "repositories": {
                    "api": {
                        "name": "api",
                        "github-actions-workflows": {
                            "ci": {"relativePath": ".github/workflows/ci.yml"}
                        }
                    }
                }
            }
        });
        let errors = validate("pipeline-exists", &rule, ScmPlatform::Github, &tree).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_file_level_error_resolves_relative_path() {
        let rule = Rule {
            description: String::new(),
            unique_id: 2,
            failure_message: "file must carry content".to_string(),
            enabled_by_default: true,
            in_code_implementation: false,
            schema: Some(json!({
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "properties": {
                        "repositories": {
                            "type": "object",
                            "additionalProperties": {
                                "type": "object",
                                "properties": {
                                    "github-actions-workflows": {
                                        "type": "object",
                                        "additionalProperties": {
                                            "type": "object",
                                            "required": ["content"]
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            })),
        };
        let tree = json!({
            "acme": {
                "repositories": {
                    "api": {
                        "github-actions-workflows": {
                            "ci[ESCAPED_DOT]yml": {
                                "relativePath": ".github/workflows/ci.yml"
                            }
                        }
                    }
                }
            }
        });
        let errors = validate("content-required", &rule, ScmPlatform::Github, &tree).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_level, 4);
        assert_eq!(errors[0].ci_platform, Some(CiPlatform::GithubActions));
        assert_eq!(errors[0].pipeline_rel_path, ".github/workflows/ci.yml");
    }

    #[test]
    fn test_invalid_schema_is_per_rule_error() {
        let mut rule = pipeline_exists_rule();
        rule.schema = Some(json!({"type": "not-a-type"}));
        let err = validate("broken", &rule, ScmPlatform::Github, &json!({})).unwrap_err();
        assert!(matches!(err, ScanError::SchemaCompile { .. }));
    }
}
