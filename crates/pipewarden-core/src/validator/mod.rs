//! Dual-mode rule validation over the normalized data trees.
//!
//! A rule is evaluated either declaratively (its JSON Schema runs against the
//! whole per-platform tree, see [`schema`]) or procedurally (a regex detector
//! scans step/script content, see [`detectors`]). Both modes produce the same
//! [`SchemaError`] location type so results aggregate uniformly.

pub mod detectors;
pub mod schema;

use crate::error::ScanError;
use crate::model::{CiPlatform, GithubData, GitlabData, ScmPlatform};
use crate::rules::Rule;
use serde::Serialize;

/// One rule violation, located as deep into the
/// owner -> repo -> CI platform -> file hierarchy as the evidence allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaError {
    pub owner_name: String,
    pub repository_name: String,
    pub ci_platform: Option<CiPlatform>,
    pub pipeline_rel_path: String,
    pub scm_platform: ScmPlatform,
    /// Depth of the match: 0 whole tree, 1 owner, 2 repository,
    /// 3 CI platform, 4 specific file.
    pub error_level: u8,
}

/// Per-run validator holding read-only references to the fetched trees plus
/// their JSON projection for schema evaluation.
pub struct Validator<'a> {
    github: Option<&'a GithubData>,
    gitlab: Option<&'a GitlabData>,
    github_tree: Option<serde_json::Value>,
    gitlab_tree: Option<serde_json::Value>,
}

impl<'a> Validator<'a> {
    pub fn new(
        github: Option<&'a GithubData>,
        gitlab: Option<&'a GitlabData>,
    ) -> Result<Validator<'a>, ScanError> {
        let github_tree = github
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ScanError::Config(format!("failed to project github tree: {e}")))?;
        let gitlab_tree = gitlab
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ScanError::Config(format!("failed to project gitlab tree: {e}")))?;
        Ok(Validator {
            github,
            gitlab,
            github_tree,
            gitlab_tree,
        })
    }

    /// Evaluate one rule against one SCM platform's tree.
    ///
    /// An absent tree yields zero errors — the platform simply was not
    /// fetched. Parse warnings for individual files are appended to
    /// `warnings`.
    pub fn validate(
        &self,
        rule_name: &str,
        rule: &Rule,
        scm: ScmPlatform,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<SchemaError>, ScanError> {
        if rule.in_code_implementation {
            return match scm {
                ScmPlatform::Github => detectors::validate(rule, self.github, None, warnings),
                ScmPlatform::Gitlab => detectors::validate(rule, None, self.gitlab, warnings),
            };
        }

        let tree = match scm {
            ScmPlatform::Github => self.github_tree.as_ref(),
            ScmPlatform::Gitlab => self.gitlab_tree.as_ref(),
        };
        match tree {
            Some(tree) => schema::validate(rule_name, rule, scm, tree),
            None => Ok(Vec::new()),
        }
    }
}
