pub mod aggregate;
pub mod config;
pub mod connector;
pub mod entitlement;
pub mod error;
pub mod model;
pub mod parser;
pub mod rules;
pub mod scan;
pub mod validator;

pub use aggregate::{OutputSummary, RuleResult, RuleResults};
pub use config::{ConfigStore, TOKEN_GENERATION_URL};
pub use connector::local::LocalConnector;
pub use entitlement::{resolve_selection, RuleSelection};
pub use error::ScanError;
pub use rules::RuleCatalog;
pub use scan::{ScanContext, ScanOutcome};
pub use validator::SchemaError;
