use crate::error::ScanError;
use crate::model::ScmPlatform;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where licensed users pick their rule subset.
pub const TOKEN_GENERATION_URL: &str = "https://pipewarden.dev/selective-rules";

/// JSON-file-backed configuration store under the pipewarden home directory.
///
/// Layout:
///   <home>/config.json               key/value settings (token, ...)
///   <home>/repo_files/<scm>.json     normalized snapshots written by connectors
///   <home>/rules/<scm>/*.json        synced built-in rules
///   <home>/rules/<scm>/custom/*.json user-authored rules
#[derive(Debug, Clone)]
pub struct ConfigStore {
    home: PathBuf,
}

impl ConfigStore {
    /// Resolve the home directory: `$PIPEWARDEN_HOME`, else `~/.pipewarden`.
    pub fn new() -> Result<ConfigStore, ScanError> {
        if let Ok(home) = std::env::var("PIPEWARDEN_HOME") {
            return Ok(ConfigStore { home: PathBuf::from(home) });
        }
        let user_home = std::env::var("HOME")
            .map_err(|_| ScanError::Config("cannot resolve home directory".to_string()))?;
        Ok(ConfigStore {
            home: Path::new(&user_home).join(".pipewarden"),
        })
    }

    /// Use an explicit home directory (tests, sandboxed runs).
    pub fn with_home(home: impl Into<PathBuf>) -> ConfigStore {
        ConfigStore { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn snapshot_path(&self, scm: ScmPlatform) -> PathBuf {
        self.home.join("repo_files").join(format!("{}.json", scm.as_str()))
    }

    pub fn rules_dir(&self, scm: ScmPlatform) -> PathBuf {
        self.home.join("rules").join(scm.as_str())
    }

    fn config_path(&self) -> PathBuf {
        self.home.join("config.json")
    }

    fn read_settings(&self) -> Result<BTreeMap<String, String>, ScanError> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ScanError::Config(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| ScanError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    fn write_settings(&self, settings: &BTreeMap<String, String>) -> Result<(), ScanError> {
        std::fs::create_dir_all(&self.home)
            .map_err(|e| ScanError::Config(format!("failed to create {}: {e}", self.home.display())))?;
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| ScanError::Config(e.to_string()))?;
        std::fs::write(self.config_path(), content)
            .map_err(|e| ScanError::Config(format!("failed to write config: {e}")))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ScanError> {
        Ok(self.read_settings()?.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), ScanError> {
        let mut settings = self.read_settings()?;
        settings.insert(key.to_string(), value.to_string());
        self.write_settings(&settings)
    }

    pub fn clear(&self, key: &str) -> Result<(), ScanError> {
        let mut settings = self.read_settings()?;
        settings.remove(key);
        self.write_settings(&settings)
    }

    /// Write built-in rule files into the home rules directory, refreshing
    /// existing ones so upgraded defaults take effect.
    pub fn sync_rules(
        &self,
        scm: ScmPlatform,
        files: &[(&str, &str)],
    ) -> Result<(), ScanError> {
        let dir = self.rules_dir(scm);
        std::fs::create_dir_all(&dir)
            .map_err(|e| ScanError::Config(format!("failed to create {}: {e}", dir.display())))?;
        for (filename, content) in files {
            let path = dir.join(filename);
            std::fs::write(&path, content)
                .map_err(|e| ScanError::Config(format!("failed to write {}: {e}", path.display())))?;
        }
        Ok(())
    }
}
