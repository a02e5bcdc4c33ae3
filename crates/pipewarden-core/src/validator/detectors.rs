//! Procedural rule detectors.
//!
//! Rules that cannot be expressed as a schema shape ("some step must run an
//! SCA scanner") are pattern tables: a `uses` family for declarative action
//! references, a `run`/script family for free-text commands, an optional
//! `uses`+`with` compound for GitHub Actions, and an optional image family
//! for GitLab jobs where a scanning container is sufficient evidence.
//!
//! Scanning short-circuits per repository on the first match; only presence
//! matters. JFrog pipeline files are a shared secondary surface for both
//! GitHub- and GitLab-hosted repositories. A repository with no match at all
//! yields one error at repository granularity (level 2).

use super::SchemaError;
use crate::error::ScanError;
use crate::model::{GithubData, GitlabData, PipelineFiles, ScmPlatform};
use crate::parser::github::Workflow;
use crate::parser::gitlab::StageBody;
use crate::parser::jfrog::JfrogPipelineFile;
use crate::rules::Rule;
use regex::Regex;

/// Compound match: an action reference plus a specific `with:` parameter
/// value, e.g. a scanner action only counts when a scanning mode is enabled.
pub struct UsesWithMatch {
    pub uses: &'static str,
    pub with_key: &'static str,
    pub with_value: &'static str,
}

pub struct Detector {
    pub rule_id: u32,
    pub uses_patterns: &'static [&'static str],
    pub run_patterns: &'static [&'static str],
    pub uses_with_patterns: &'static [UsesWithMatch],
    pub image_patterns: &'static [&'static str],
}

const DETECTORS: &[Detector] = &[
    // SCA scanner
    Detector {
        rule_id: 10,
        uses_patterns: &[
            r".*anchore/scan-action@.*",
            r".*synopsys-sig/detect-action@.*",
            r".*aquasecurity/trivy-action@.*",
            r".*checkmarx-ts/checkmarx-cxflow-github-action@.*",
            r".*snyk/actions/maven@.*",
        ],
        run_patterns: &[
            r"^[\S]*trivy.*|.*docker( .*)? run .*(aquasec/)?trivy.*",
            r"^[\S]*grype.*|.*docker( .*)? run .*(anchore/)?grype.*",
            r"(jfrog|jf) (s|scan).*",
            r"ws scan.*",
            r"snyk (code |)test.*",
            r"(jfrog|jf) (xr).*",
        ],
        uses_with_patterns: &[],
        image_patterns: &[r"registry\.gitlab\.com/secure.*"],
    },
    // Infrastructure-as-code scanner
    Detector {
        rule_id: 11,
        uses_patterns: &[
            r".*bridgecrewio/checkov-action@.*",
            r".*tenable/terrascan-action@.*",
            r".*snyk/actions/iac@.*",
            r".*aquasecurity/trivy-action@.*",
            r".*checkmarx/kics-github-action@.*",
            r".*kubescape/github-action@.*",
        ],
        run_patterns: &[
            r"^[\S]*trivy.*|.*docker( .*)? run .*(aquasec/)?trivy.*",
            r".*docker .* run .*checkmarx/kics scan.*",
            r".*kubescape scan.*",
        ],
        uses_with_patterns: &[],
        image_patterns: &[],
    },
    // Code coverage checker
    Detector {
        rule_id: 14,
        uses_patterns: &[r".*codecov/codecov-action@.*"],
        run_patterns: &[r".*codecov -t.*"],
        uses_with_patterns: &[],
        image_patterns: &[],
    },
    // Secrets scanner
    Detector {
        rule_id: 15,
        uses_patterns: &[
            r".*trufflesecurity/trufflehog@.*",
            r".*GitGuardian/ggshield/actions/secret@.*",
            r".*GitGuardian/ggshield-action@.*",
            r".*gitleaks/gitleaks-action@.*",
        ],
        run_patterns: &[
            r"^[\S]*trufflehog.*|.*docker .* run .*(trufflesecurity/)?trufflehog.*",
            r".*ggshield secret scan.*",
            r"^[\S]*gitleaks.*|.*docker .* run .*(zricethezav/)?gitleaks.*",
            r"^[\S]*trivy fs.*|.*docker .* run .*(aquasec/)?trivy fs.*",
        ],
        uses_with_patterns: &[UsesWithMatch {
            uses: r".*aquasecurity/trivy-action@.*",
            with_key: "security-checks",
            with_value: "secret",
        }],
        image_patterns: &[],
    },
    // Linter
    Detector {
        rule_id: 16,
        uses_patterns: &[
            r".*wemake-services/wemake-python-styleguide@.*",
            r".*github/super-linter@.*",
            r".*oxsecurity/megalinter@.*",
        ],
        run_patterns: &[
            r"^[\S]*pip install wemake-python-styleguide.*",
            r"^[\S]*flake8 .*",
            r"^[\S]*eslint .*",
            r"^[\S]*golangci-lint run.*",
            r".*mega-linter-runner.*",
        ],
        uses_with_patterns: &[],
        image_patterns: &[],
    },
    // Code quality scanner
    Detector {
        rule_id: 17,
        uses_patterns: &[
            r".*paambaati/codeclimate-action@.*",
            r".*kitabisa/sonarqube-action@.*",
            r".*sonarsource/sonarcloud-github-action@.*",
        ],
        run_patterns: &[r".*docker .* run .*codeclimate/codeclimate analyze.*"],
        uses_with_patterns: &[],
        image_patterns: &[],
    },
];

pub fn detector_for(rule_id: u32) -> Option<&'static Detector> {
    DETECTORS.iter().find(|d| d.rule_id == rule_id)
}

/// Run the detector for an in-code rule over whichever trees are present.
pub fn validate(
    rule: &Rule,
    github: Option<&GithubData>,
    gitlab: Option<&GitlabData>,
    warnings: &mut Vec<String>,
) -> Result<Vec<SchemaError>, ScanError> {
    let detector = detector_for(rule.unique_id).ok_or(ScanError::MissingDetector(rule.unique_id))?;

    let mut errors = Vec::new();
    if let Some(data) = github {
        errors.extend(detector.scan_github(data, warnings));
    }
    if let Some(data) = gitlab {
        errors.extend(detector.scan_gitlab(data, warnings));
    }
    Ok(errors)
}

/// Case-sensitive substring/pattern search. An invalid pattern never matches.
fn match_any(patterns: &[&str], text: &str) -> bool {
    patterns.iter().any(|pattern| {
        Regex::new(pattern)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    })
}

impl Detector {
    fn scan_github(&self, data: &GithubData, warnings: &mut Vec<String>) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        for owner in data.values() {
            for repo in owner.repositories.values() {
                let mut found = self.github_workflows_have_match(repo, warnings);
                if !found {
                    found = self.jfrog_has_match(&repo.jfrog_pipelines, warnings);
                }
                if !found {
                    errors.push(SchemaError {
                        owner_name: owner.name.clone(),
                        repository_name: repo.name.clone(),
                        ci_platform: None,
                        pipeline_rel_path: String::new(),
                        scm_platform: ScmPlatform::Github,
                        error_level: 2,
                    });
                }
            }
        }
        errors
    }

    fn scan_gitlab(&self, data: &GitlabData, warnings: &mut Vec<String>) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        for group in data.values() {
            for project in group.projects.values() {
                let mut found = project
                    .gitlab_ci
                    .values()
                    .any(|file| self.gitlab_file_has_match(&file.content));
                if !found {
                    found = self.jfrog_has_match(&project.jfrog_pipelines, warnings);
                }
                if !found {
                    errors.push(SchemaError {
                        owner_name: group.name.clone(),
                        repository_name: project.name.clone(),
                        ci_platform: None,
                        pipeline_rel_path: String::new(),
                        scm_platform: ScmPlatform::Gitlab,
                        error_level: 2,
                    });
                }
            }
        }
        errors
    }

    fn github_workflows_have_match(
        &self,
        repo: &crate::model::GithubRepository,
        warnings: &mut Vec<String>,
    ) -> bool {
        for file in repo.github_actions_workflows.values() {
            let workflow = match Workflow::from_content(&file.content) {
                Ok(workflow) => workflow,
                Err(e) => {
                    warnings.push(format!(
                        "skipping workflow {} in {}: {e}",
                        file.relative_path, repo.name
                    ));
                    continue;
                }
            };
            if workflow.steps().any(|step| self.step_matches(step)) {
                return true;
            }
        }
        false
    }

    fn step_matches(&self, step: &crate::parser::github::Step) -> bool {
        if match_any(self.uses_patterns, &step.uses) {
            return true;
        }
        if match_any(self.run_patterns, &step.run) {
            return true;
        }
        self.uses_with_patterns.iter().any(|compound| {
            match_any(&[compound.uses], &step.uses)
                && step.with.iter().any(|(key, value)| {
                    let value_text = match value.as_str() {
                        Some(s) => s.to_string(),
                        None => value.to_string(),
                    };
                    key == compound.with_key && match_any(&[compound.with_value], &value_text)
                })
        })
    }

    fn gitlab_file_has_match(&self, content: &serde_json::Value) -> bool {
        let Some(entries) = content.as_object() else {
            return false;
        };
        for (key, value) in entries {
            if key == "image" {
                let image = match value.as_str() {
                    Some(s) => s.to_string(),
                    None => value.to_string(),
                };
                if match_any(self.image_patterns, &image) {
                    return true;
                }
            }
            let scripts_match = StageBody::decode(value)
                .scripts()
                .iter()
                .any(|script| match_any(self.run_patterns, script));
            if scripts_match {
                return true;
            }
        }
        false
    }

    fn jfrog_has_match(&self, files: &PipelineFiles, warnings: &mut Vec<String>) -> bool {
        for file in files.values() {
            let pipeline_file = match JfrogPipelineFile::from_content(&file.content) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warnings.push(format!(
                        "skipping jfrog pipeline {}: {e}",
                        file.relative_path
                    ));
                    continue;
                }
            };
            let commands_match = pipeline_file
                .execution_commands()
                .any(|command| match_any(self.run_patterns, command));
            if commands_match {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CiPlatform, GithubOwner, GithubRepository, GitlabGroup, GitlabProject, PipelineFile};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn sca_rule() -> Rule {
        Rule {
            description: "sca".to_string(),
            unique_id: 10,
            schema: None,
            failure_message: "add an SCA scanner".to_string(),
            enabled_by_default: true,
            in_code_implementation: true,
        }
    }

    fn workflow_file(content: Value) -> PipelineFile {
        PipelineFile {
            relative_path: ".github/workflows/ci.yml".to_string(),
            filename: "ci.yml".to_string(),
            origin: CiPlatform::GithubActions,
            content,
        }
    }

    fn github_repo(workflows: Vec<PipelineFile>, jfrog: Vec<PipelineFile>) -> GithubRepository {
        let mut workflow_map = BTreeMap::new();
        for (i, file) in workflows.into_iter().enumerate() {
            workflow_map.insert(format!("wf{i}"), file);
        }
        let mut jfrog_map = BTreeMap::new();
        for (i, file) in jfrog.into_iter().enumerate() {
            jfrog_map.insert(format!("jf{i}"), file);
        }
        GithubRepository {
            name: "api".to_string(),
            full_name: "acme/api".to_string(),
            id: 1,
            programming_languages: None,
            github_actions_workflows: workflow_map,
            jfrog_pipelines: jfrog_map,
        }
    }

    fn github_data(repo: GithubRepository) -> GithubData {
        let mut repositories = BTreeMap::new();
        repositories.insert(repo.name.clone(), repo);
        let mut data = BTreeMap::new();
        data.insert(
            "acme".to_string(),
            GithubOwner {
                name: "acme".to_string(),
                owner_type: "organization".to_string(),
                id: 1,
                repositories,
            },
        );
        data
    }

    fn gitlab_data(ci_content: Value) -> GitlabData {
        let mut gitlab_ci = BTreeMap::new();
        gitlab_ci.insert(
            "gitlab-ci".to_string(),
            PipelineFile {
                relative_path: ".gitlab-ci.yml".to_string(),
                filename: ".gitlab-ci.yml".to_string(),
                origin: CiPlatform::GitlabCi,
                content: ci_content,
            },
        );
        let mut projects = BTreeMap::new();
        projects.insert(
            "api".to_string(),
            GitlabProject {
                name: "api".to_string(),
                full_name: "team/api".to_string(),
                id: 1,
                gitlab_ci,
                jfrog_pipelines: BTreeMap::new(),
            },
        );
        let mut data = BTreeMap::new();
        data.insert(
            "team".to_string(),
            GitlabGroup {
                name: "team".to_string(),
                id: 1,
                projects,
            },
        );
        data
    }

    #[test]
    fn test_sca_run_step_passes() {
        let workflow = workflow_file(json!({
            "jobs": {"scan": {"steps": [{"run": "trivy image myimage"}]}}
        }));
        let data = github_data(github_repo(vec![workflow], vec![]));
        let mut warnings = Vec::new();
        let errors = validate(&sca_rule(), Some(&data), None, &mut warnings).unwrap();
        assert!(errors.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_sca_uses_step_passes() {
        let workflow = workflow_file(json!({
            "jobs": {"scan": {"steps": [{"uses": "aquasecurity/trivy-action@master"}]}}
        }));
        let data = github_data(github_repo(vec![workflow], vec![]));
        let errors = validate(&sca_rule(), Some(&data), None, &mut Vec::new()).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_scanner_fails_at_repository_level() {
        let workflow = workflow_file(json!({
            "jobs": {"build": {"steps": [{"run": "cargo build"}]}}
        }));
        let data = github_data(github_repo(vec![workflow], vec![]));
        let errors = validate(&sca_rule(), Some(&data), None, &mut Vec::new()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_level, 2);
        assert_eq!(errors[0].owner_name, "acme");
        assert_eq!(errors[0].repository_name, "api");
        assert_eq!(errors[0].scm_platform, ScmPlatform::Github);
    }

    #[test]
    fn test_jfrog_fallback_satisfies_github_repo() {
        let workflow = workflow_file(json!({
            "jobs": {"build": {"steps": [{"run": "cargo build"}]}}
        }));
        let jfrog = PipelineFile {
            relative_path: "jfrog-pipelines.yml".to_string(),
            filename: "jfrog-pipelines.yml".to_string(),
            origin: CiPlatform::JfrogPipelines,
            content: json!({
                "pipelines": [{"steps": [{"execution": {"onExecute": ["jf scan target/"]}}]}]
            }),
        };
        let data = github_data(github_repo(vec![workflow], vec![jfrog]));
        let errors = validate(&sca_rule(), Some(&data), None, &mut Vec::new()).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_malformed_workflow_is_skipped_with_warning() {
        let bad = workflow_file(json!({"jobs": ["not", "a", "map"]}));
        let good = workflow_file(json!({
            "jobs": {"scan": {"steps": [{"run": "grype dir:."}]}}
        }));
        let data = github_data(github_repo(vec![bad, good], vec![]));
        let mut warnings = Vec::new();
        let errors = validate(&sca_rule(), Some(&data), None, &mut warnings).unwrap();
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("skipping workflow"));
    }

    #[test]
    fn test_gitlab_script_stage_passes() {
        let data = gitlab_data(json!({
            "stages": ["test"],
            "scan": {"script": ["trivy image myimage"]}
        }));
        let errors = validate(&sca_rule(), None, Some(&data), &mut Vec::new()).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_gitlab_image_evidence_passes() {
        let data = gitlab_data(json!({
            "image": "registry.gitlab.com/secure/scanner:latest",
            "build": {"script": "make build"}
        }));
        let errors = validate(&sca_rule(), None, Some(&data), &mut Vec::new()).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_gitlab_without_scanner_fails() {
        let data = gitlab_data(json!({
            "image": "node:18",
            "build": {"script": "npm run build"}
        }));
        let errors = validate(&sca_rule(), None, Some(&data), &mut Vec::new()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_level, 2);
        assert_eq!(errors[0].scm_platform, ScmPlatform::Gitlab);
    }

    #[test]
    fn test_uses_with_compound_match() {
        let rule = Rule {
            description: "secrets".to_string(),
            unique_id: 15,
            schema: None,
            failure_message: "add a secrets scanner".to_string(),
            enabled_by_default: true,
            in_code_implementation: true,
        };

        let with_secret = workflow_file(json!({
            "jobs": {"scan": {"steps": [{
                "uses": "aquasecurity/trivy-action@master",
                "with": {"security-checks": "vuln,secret"}
            }]}}
        }));
        let data = github_data(github_repo(vec![with_secret], vec![]));
        assert!(validate(&rule, Some(&data), None, &mut Vec::new())
            .unwrap()
            .is_empty());

        // Same action without the secret check enabled does not count.
        let without_secret = workflow_file(json!({
            "jobs": {"scan": {"steps": [{
                "uses": "aquasecurity/trivy-action@master",
                "with": {"security-checks": "vuln"}
            }]}}
        }));
        let data = github_data(github_repo(vec![without_secret], vec![]));
        assert_eq!(
            validate(&rule, Some(&data), None, &mut Vec::new())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_missing_detector_is_error() {
        let mut rule = sca_rule();
        rule.unique_id = 999;
        let err = validate(&rule, None, None, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ScanError::MissingDetector(999)));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        assert!(!match_any(&["(unclosed"], "anything"));
        assert!(match_any(&["(unclosed", "any.*"], "anything"));
    }
}
