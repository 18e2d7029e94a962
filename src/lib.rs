//! dbseed application library
//!
//! Wires settings, the provisioning spec, and the MongoDB target together
//! for the `dbseed-app` entrypoint and the `dbseed` CLI.

pub mod provision;
pub mod report;

/// Re-export commonly used types
pub use provision::{load_spec, provision, DEFAULT_SPEC};
pub use report::{exit_code, render_json, render_text, ExitStatus};
