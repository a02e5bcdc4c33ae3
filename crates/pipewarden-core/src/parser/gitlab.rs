use serde::Deserialize;
use serde_json::Value;

/// Body of one top-level GitLab CI entry.
///
/// GitLab permits `script:` as either a single string or a list of strings.
/// Entries that decode as neither (e.g. `image:`, `variables:`, `stages:`)
/// are not script stages and are skipped without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageBody {
    Script(String),
    Scripts(Vec<String>),
    Other,
}

#[derive(Deserialize)]
struct SingleScript {
    script: String,
}

#[derive(Deserialize)]
struct MultiScript {
    script: Vec<String>,
}

impl StageBody {
    /// Decode a stage body, trying the single-script shape first.
    pub fn decode(value: &Value) -> StageBody {
        if let Ok(single) = serde_json::from_value::<SingleScript>(value.clone()) {
            return StageBody::Script(single.script);
        }
        if let Ok(multi) = serde_json::from_value::<MultiScript>(value.clone()) {
            return StageBody::Scripts(multi.script);
        }
        StageBody::Other
    }

    /// All script lines of this stage, empty for non-script stages.
    pub fn scripts(&self) -> Vec<&str> {
        match self {
            StageBody::Script(s) => vec![s.as_str()],
            StageBody::Scripts(list) => list.iter().map(String::as_str).collect(),
            StageBody::Other => Vec::new(),
        }
    }
}
