use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// GitHub Actions workflow, reduced to the parts rules match against.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub jobs: BTreeMap<String, Job>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub uses: String,
    #[serde(default)]
    pub run: String,
    #[serde(default)]
    pub with: BTreeMap<String, Value>,
}

impl Workflow {
    /// Decode a workflow from pipeline-file content. Shape mismatch is an
    /// error for this file only.
    pub fn from_content(content: &Value) -> Result<Workflow, serde_json::Error> {
        serde_json::from_value(content.clone())
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.jobs.values().flat_map(|job| job.steps.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_workflow_with_steps() {
        let content = json!({
            "name": "CI",
            "on": "push",
            "jobs": {
                "build": {
                    "runs-on": "ubuntu-latest",
                    "steps": [
                        {"uses": "actions/checkout@v4"},
                        {"run": "cargo test", "with": {"toolchain": "stable"}}
                    ]
                }
            }
        });
        let workflow = Workflow::from_content(&content).unwrap();
        assert_eq!(workflow.jobs.len(), 1);
        let steps: Vec<_> = workflow.steps().collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].uses, "actions/checkout@v4");
        assert_eq!(steps[1].run, "cargo test");
    }

    #[test]
    fn test_decode_workflow_without_jobs() {
        let workflow = Workflow::from_content(&json!({"name": "empty"})).unwrap();
        assert!(workflow.jobs.is_empty());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        // `jobs` must be a mapping; a list is a decode failure for the file.
        assert!(Workflow::from_content(&json!({"jobs": ["not", "a", "map"]})).is_err());
    }
}
