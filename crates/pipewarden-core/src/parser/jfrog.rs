use serde::Deserialize;
use serde_json::Value;

/// JFrog Pipelines definition file, reduced to the executed command lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JfrogPipelineFile {
    #[serde(default)]
    pub pipelines: Vec<JfrogPipeline>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JfrogPipeline {
    #[serde(default)]
    pub steps: Vec<JfrogStep>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JfrogStep {
    #[serde(default)]
    pub execution: JfrogExecution,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JfrogExecution {
    #[serde(rename = "onExecute", default)]
    pub on_execute: Vec<String>,
}

impl JfrogPipelineFile {
    pub fn from_content(content: &Value) -> Result<JfrogPipelineFile, serde_json::Error> {
        serde_json::from_value(content.clone())
    }

    /// Every `onExecute` command across all pipelines and steps.
    pub fn execution_commands(&self) -> impl Iterator<Item = &str> {
        self.pipelines
            .iter()
            .flat_map(|p| p.steps.iter())
            .flat_map(|s| s.execution.on_execute.iter())
            .map(String::as_str)
    }
}
