//! Connectors produce the normalized data trees the core validates.
//!
//! Remote SCM connectors live outside this crate and persist their snapshots
//! under the config home; only the local-directory connector is built in.

pub mod local;
