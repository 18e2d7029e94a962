//! Core of dbseed: settings, the provisioning spec model, and the
//! bootstrapper that applies a spec to a target through the
//! [`Connector`]/[`Session`] seam.

pub mod bootstrapper;
pub mod connector;
pub mod error;
pub mod memory;
pub mod outcome;
pub mod settings;
pub mod spec;

pub use bootstrapper::{BootstrapPolicy, Bootstrapper};
pub use connector::{Connector, Creation, Session};
pub use error::{ErrorKind, ProvisionError, SpecError};
pub use memory::MemoryConnector;
pub use outcome::{ExecutionResult, RunReport, Status};
pub use spec::{Action, ProvisioningSpec, RoleGrant, Secret};
