use thiserror::Error;

/// Error taxonomy for a scan run.
///
/// Variants that are fatal to the whole run abort it (`NoData`,
/// `TokenDecode`, config-store I/O). Per-rule failures (`InvalidRule`,
/// `SchemaCompile`, `MissingDetector`) skip only the offending rule; the run
/// continues and surfaces them next to the results. Per-file parse failures
/// never become a `ScanError` at all — they are collected as warnings.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(
        "missing repository data. Fetch repositories with a connector first, \
         or pass a local directory: 'pipewarden validate <PATH>'"
    )]
    NoData,

    #[error("rule {name} is invalid: {reason}")]
    InvalidRule { name: String, reason: String },

    #[error("error validating schema in {scm} for rule {name}: {reason}")]
    SchemaCompile {
        name: String,
        scm: String,
        reason: String,
    },

    #[error("missing detector implementation for rule {0}")]
    MissingDetector(u32),

    #[error(
        "error decoding token. Run 'pipewarden config clear token' to clear \
         the existing token and generate a new one at {url}"
    )]
    TokenDecode { url: String },

    #[error("failed to read rule file {path}: {source}")]
    RuleIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config store error: {0}")]
    Config(String),
}

impl ScanError {
    /// Whether this error aborts the whole run rather than a single rule.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::NoData | ScanError::TokenDecode { .. } | ScanError::Config(_)
        )
    }
}
