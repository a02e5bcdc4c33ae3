//! Scan orchestration: load trees, resolve the rule selection, evaluate every
//! catalog rule on every SCM platform, and aggregate the results.
//!
//! A per-rule problem (unreadable file, bad structure, unknown detector id)
//! is recorded and the scan continues; only run-level problems (no data at
//! all, malformed snapshot, malformed token) abort.

use crate::aggregate::{
    merge_rule_result, reduce_local_rule_results, OutputSummary, RuleResults,
};
use crate::config::{ConfigStore, TOKEN_GENERATION_URL};
use crate::connector::local::LocalScanData;
use crate::entitlement::RuleSelection;
use crate::error::ScanError;
use crate::model::{GithubData, GitlabData, ScmPlatform};
use crate::rules::RuleCatalog;
use crate::validator::Validator;
use std::collections::BTreeSet;

#[derive(Debug)]
pub struct ScanContext {
    github: Option<GithubData>,
    gitlab: Option<GitlabData>,
    catalog: RuleCatalog,
    selection: RuleSelection,
    is_local: bool,
    warnings: Vec<String>,
}

/// Everything one scan produced, ready for display.
#[derive(Debug)]
pub struct ScanOutcome {
    pub results: RuleResults,
    pub summary: OutputSummary,
    /// Rules skipped because the selection excludes them.
    pub disabled_rules: Vec<String>,
    /// Per-rule evaluation failures that did not abort the run.
    pub rule_errors: Vec<String>,
    /// Non-fatal notes, mostly unparseable pipeline files.
    pub warnings: Vec<String>,
}

impl ScanOutcome {
    pub fn violations_found(&self) -> bool {
        self.results.values().any(|r| !r.valid)
    }
}

impl ScanContext {
    /// Scan the snapshots previously persisted by remote connectors.
    pub fn from_snapshots(
        store: &ConfigStore,
        catalog: RuleCatalog,
        selection: RuleSelection,
    ) -> Result<ScanContext, ScanError> {
        Ok(ScanContext {
            github: read_snapshot(store, ScmPlatform::Github)?,
            gitlab: read_snapshot(store, ScmPlatform::Gitlab)?,
            catalog,
            selection,
            is_local: false,
            warnings: Vec::new(),
        })
    }

    /// Scan a local directory's speculatively-shaped trees.
    pub fn from_local(
        data: LocalScanData,
        catalog: RuleCatalog,
        selection: RuleSelection,
    ) -> ScanContext {
        ScanContext {
            github: Some(data.github),
            gitlab: Some(data.gitlab),
            catalog,
            selection,
            is_local: true,
            warnings: data.warnings,
        }
    }

    pub fn run(&self) -> Result<ScanOutcome, ScanError> {
        if self.github.is_none() && self.gitlab.is_none() {
            return Err(ScanError::NoData);
        }

        let validator = Validator::new(self.github.as_ref(), self.gitlab.as_ref())?;
        let mut results = RuleResults::new();
        let mut disabled: BTreeSet<String> = BTreeSet::new();
        let mut rule_errors = Vec::new();
        let mut warnings = self.warnings.clone();

        for scm in ScmPlatform::ALL {
            for name in self.catalog.rule_names(scm) {
                let rule = match self.catalog.get_rule(&name, scm) {
                    Ok(rule) => rule,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        rule_errors.push(e.to_string());
                        continue;
                    }
                };

                if !self.selection.is_active(&rule) {
                    disabled.insert(name);
                    continue;
                }

                let errors = match validator.validate(&name, &rule, scm, &mut warnings) {
                    Ok(errors) => errors,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        rule_errors.push(e.to_string());
                        continue;
                    }
                };
                merge_rule_result(
                    &mut results,
                    rule.unique_id,
                    &name,
                    &rule.failure_message,
                    errors,
                );
            }
        }

        if self.is_local {
            results = reduce_local_rule_results(results);
        }

        let mut summary = self.count_summary();
        summary.total_rules_evaluated = results.len();
        summary.total_failed_rules = results.values().filter(|r| !r.valid).count();
        if self.selection.is_anonymous() {
            summary.url = Some(TOKEN_GENERATION_URL.to_string());
        }

        Ok(ScanOutcome {
            results,
            summary,
            disabled_rules: disabled.into_iter().collect(),
            rule_errors,
            warnings,
        })
    }

    fn count_summary(&self) -> OutputSummary {
        let mut summary = OutputSummary::default();
        if let Some(github) = &self.github {
            summary.total_owners += github.len();
            for owner in github.values() {
                summary.total_repositories += owner.repositories.len();
                for repo in owner.repositories.values() {
                    summary.total_pipelines +=
                        repo.github_actions_workflows.len() + repo.jfrog_pipelines.len();
                }
            }
        }
        if let Some(gitlab) = &self.gitlab {
            summary.total_owners += gitlab.len();
            for group in gitlab.values() {
                summary.total_repositories += group.projects.len();
                for project in group.projects.values() {
                    summary.total_pipelines +=
                        project.gitlab_ci.len() + project.jfrog_pipelines.len();
                }
            }
        }
        summary
    }
}

fn read_snapshot<T: serde::de::DeserializeOwned>(
    store: &ConfigStore,
    scm: ScmPlatform,
) -> Result<Option<T>, ScanError> {
    let path = store.snapshot_path(scm);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| ScanError::Config(format!("failed to read {}: {e}", path.display())))?;
    let data = serde_json::from_str(&content)
        .map_err(|e| ScanError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(data))
}
