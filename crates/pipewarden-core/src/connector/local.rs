//! Local-directory connector.
//!
//! Walks a directory tree, picks up pipeline files by the per-platform path
//! regexes, and builds a single-owner normalized tree twice: once
//! GitHub-shaped and once GitLab-shaped. A local directory has no SCM
//! platform of record, so both shapes are evaluated speculatively and the
//! aggregation step later keeps the more informative variant.

use crate::model::{
    escape_json_key, yaml_to_json, CiPlatform, GithubData, GithubOwner, GithubRepository,
    GitlabData, GitlabGroup, GitlabProject, PipelineFile, PipelineFiles,
};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LOCAL_OWNER: &str = "local";

/// Both speculative trees plus per-file parse warnings.
#[derive(Debug)]
pub struct LocalScanData {
    pub github: GithubData,
    pub gitlab: GitlabData,
    pub warnings: Vec<String>,
}

pub struct LocalConnector {
    root: PathBuf,
}

impl LocalConnector {
    pub fn new(root: impl Into<PathBuf>) -> Result<LocalConnector> {
        let root = root.into();
        if !root.is_dir() {
            anyhow::bail!("'{}' is not a directory", root.display());
        }
        Ok(LocalConnector { root })
    }

    pub fn collect(&self) -> Result<LocalScanData> {
        let mut warnings = Vec::new();
        let mut files_by_platform: BTreeMap<CiPlatform, PipelineFiles> = BTreeMap::new();

        let mut paths = discover_yaml_files(&self.root)?;
        paths.sort();

        for path in paths {
            let relative = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            if in_skipped_dir(&relative) {
                continue;
            }
            let Some(platform) = classify(&relative) else {
                continue;
            };

            let content = match read_pipeline_content(&path) {
                Ok(content) => content,
                Err(e) => {
                    warnings.push(format!("skipping {relative}: {e:#}"));
                    continue;
                }
            };

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let key = escape_json_key(&filename);
            files_by_platform.entry(platform).or_default().insert(
                key,
                PipelineFile {
                    relative_path: relative,
                    filename,
                    origin: platform,
                    content,
                },
            );
        }

        Ok(self.build_trees(files_by_platform, warnings))
    }

    fn build_trees(
        &self,
        mut files: BTreeMap<CiPlatform, PipelineFiles>,
        warnings: Vec<String>,
    ) -> LocalScanData {
        let repo_name = escape_json_key(&self.root.to_string_lossy());
        let workflows = files.remove(&CiPlatform::GithubActions).unwrap_or_default();
        let gitlab_ci = files.remove(&CiPlatform::GitlabCi).unwrap_or_default();
        let jfrog = files.remove(&CiPlatform::JfrogPipelines).unwrap_or_default();

        let mut repositories = BTreeMap::new();
        repositories.insert(
            repo_name.clone(),
            GithubRepository {
                name: repo_name.clone(),
                full_name: repo_name.clone(),
                id: 0,
                programming_languages: None,
                github_actions_workflows: workflows,
                jfrog_pipelines: jfrog.clone(),
            },
        );
        let mut github = GithubData::new();
        github.insert(
            LOCAL_OWNER.to_string(),
            GithubOwner {
                name: LOCAL_OWNER.to_string(),
                owner_type: String::new(),
                id: 0,
                repositories,
            },
        );

        let mut projects = BTreeMap::new();
        projects.insert(
            repo_name.clone(),
            GitlabProject {
                name: repo_name.clone(),
                full_name: repo_name,
                id: 0,
                gitlab_ci,
                jfrog_pipelines: jfrog,
            },
        );
        let mut gitlab = GitlabData::new();
        gitlab.insert(
            LOCAL_OWNER.to_string(),
            GitlabGroup {
                name: LOCAL_OWNER.to_string(),
                id: 0,
                projects,
            },
        );

        LocalScanData {
            github,
            gitlab,
            warnings,
        }
    }
}

/// First CI platform whose path regex matches, in fixed platform order.
fn classify(relative_path: &str) -> Option<CiPlatform> {
    CiPlatform::ALL.into_iter().find(|platform| {
        Regex::new(platform.file_regex())
            .map(|re| re.is_match(relative_path))
            .unwrap_or(false)
    })
}

fn read_pipeline_content(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    yaml_to_json(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn discover_yaml_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for extension in ["yml", "yaml"] {
        let pattern = format!("{}/**/*.{extension}", root.display());
        let matches = glob::glob(&pattern).context("failed to read glob pattern")?;
        files.extend(matches.filter_map(|r| r.ok()).filter(|p| p.is_file()));
    }
    Ok(files)
}

/// Vendored and version-control internals are never pipeline sources.
fn in_skipped_dir(relative_path: &str) -> bool {
    relative_path.split('/').any(|segment| {
        matches!(segment, ".git" | "target" | "node_modules" | "vendor" | "dist")
    })
}
