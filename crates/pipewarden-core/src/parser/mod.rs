//! Typed extraction of pipeline-file content.
//!
//! Pipeline files carry their parsed YAML as an untyped JSON tree; the
//! procedural detectors need structural shapes instead. Each submodule
//! decodes the tree for one CI platform and fails gracefully on shape
//! mismatch — a malformed file is skipped, never fatal to the repository
//! scan.

pub mod github;
pub mod gitlab;
pub mod jfrog;
