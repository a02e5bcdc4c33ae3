use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel substituted for a literal `.` in pipeline-file map keys.
///
/// Schema violation paths are split into segments when they are mapped back
/// to owner/repo/file locations, so a dotted filename key would be misread as
/// extra path segments. Every key inserted into the normalized tree must go
/// through [`escape_json_key`] first.
pub const ESCAPED_DOT: &str = "[ESCAPED_DOT]";

/// Sentinel substituted for `{{ ... }}` template interpolations so the parsed
/// YAML stays statically analyzable.
pub const DYNAMIC_VALUE: &str = "DYNAMIC_VALUE";

/// Source-control platform a repository tree was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmPlatform {
    Github,
    Gitlab,
}

impl ScmPlatform {
    /// Fixed evaluation order; also the tie-break order for local-run
    /// result reduction.
    pub const ALL: [ScmPlatform; 2] = [ScmPlatform::Github, ScmPlatform::Gitlab];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScmPlatform::Github => "github",
            ScmPlatform::Gitlab => "gitlab",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScmPlatform::Github => "Github",
            ScmPlatform::Gitlab => "Gitlab",
        }
    }
}

impl fmt::Display for ScmPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CI/CD platform a pipeline file belongs to (its `origin`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiPlatform {
    GithubActions,
    JfrogPipelines,
    GitlabCi,
}

impl CiPlatform {
    pub const ALL: [CiPlatform; 3] = [
        CiPlatform::GithubActions,
        CiPlatform::JfrogPipelines,
        CiPlatform::GitlabCi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CiPlatform::GithubActions => "github_actions",
            CiPlatform::JfrogPipelines => "jfrog_pipelines",
            CiPlatform::GitlabCi => "gitlab_ci",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CiPlatform::GithubActions => "Github Actions",
            CiPlatform::JfrogPipelines => "Jfrog Pipelines",
            CiPlatform::GitlabCi => "Gitlab CI",
        }
    }

    /// Key of the per-repository file map in the normalized tree.
    pub fn tree_key(&self) -> &'static str {
        match self {
            CiPlatform::GithubActions => "github-actions-workflows",
            CiPlatform::JfrogPipelines => "jfrog-pipelines",
            CiPlatform::GitlabCi => "gitlab-ci",
        }
    }

    /// Regex a repository-relative path must match to count as a pipeline
    /// file of this platform.
    pub fn file_regex(&self) -> &'static str {
        match self {
            CiPlatform::GithubActions => r"\.github/workflows/.*\.ya?ml",
            CiPlatform::JfrogPipelines => r"jfrog.*\.ya?ml",
            CiPlatform::GitlabCi => r"\.gitlab-ci\.ya?ml",
        }
    }

    pub fn valid_on(&self, scm: ScmPlatform) -> bool {
        match self {
            CiPlatform::GithubActions => scm == ScmPlatform::Github,
            CiPlatform::JfrogPipelines => true,
            CiPlatform::GitlabCi => scm == ScmPlatform::Gitlab,
        }
    }

    pub fn from_tree_key(key: &str) -> Option<CiPlatform> {
        Self::ALL.iter().copied().find(|p| p.tree_key() == key)
    }
}

/// A single pipeline definition file with its YAML already converted to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFile {
    pub relative_path: String,
    pub filename: String,
    pub origin: CiPlatform,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// Map from escaped file-stem key to pipeline file.
pub type PipelineFiles = BTreeMap<String, PipelineFile>;

/// GitHub organization or user as observed by a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubOwner {
    #[serde(rename = "ownerName")]
    pub name: String,
    #[serde(rename = "ownerType", default)]
    pub owner_type: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub repositories: BTreeMap<String, GithubRepository>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubRepository {
    pub name: String,
    #[serde(rename = "fullName", default)]
    pub full_name: String,
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "programmingLanguages", default)]
    pub programming_languages: Option<Vec<String>>,
    #[serde(rename = "github-actions-workflows", default)]
    pub github_actions_workflows: PipelineFiles,
    #[serde(rename = "jfrog-pipelines", default)]
    pub jfrog_pipelines: PipelineFiles,
}

/// GitLab group as observed by a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitlabGroup {
    #[serde(rename = "groupName")]
    pub name: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub projects: BTreeMap<String, GitlabProject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitlabProject {
    pub name: String,
    #[serde(rename = "fullName", default)]
    pub full_name: String,
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "gitlab-ci", default)]
    pub gitlab_ci: PipelineFiles,
    #[serde(rename = "jfrog-pipelines", default)]
    pub jfrog_pipelines: PipelineFiles,
}

/// Full normalized tree for one SCM platform, keyed by owner/group name.
pub type GithubData = BTreeMap<String, GithubOwner>;
pub type GitlabData = BTreeMap<String, GitlabGroup>;

/// Escape literal dots in a map key so path-segment parsing stays unambiguous.
pub fn escape_json_key(key: &str) -> String {
    key.replace('.', ESCAPED_DOT)
}

pub fn unescape_json_key(key: &str) -> String {
    key.replace(ESCAPED_DOT, ".")
}

/// Convert raw pipeline YAML to a JSON tree, replacing `{{ ... }}` template
/// interpolations with the [`DYNAMIC_VALUE`] sentinel first. `${{ ... }}`
/// (GitHub Actions expressions) are left untouched.
pub fn yaml_to_json(content: &str) -> anyhow::Result<serde_json::Value> {
    let re = Regex::new(r"(^|[^$\{])\{\{[^\}]*\}\}").expect("static regex");
    let replaced = re.replace_all(content, format!("${{1}} {DYNAMIC_VALUE}"));
    let value: serde_json::Value = serde_yaml::from_str(&replaced)?;
    Ok(value)
}
