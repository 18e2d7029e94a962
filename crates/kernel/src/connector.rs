use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::ProvisionError;
use crate::spec::{RoleGrant, Secret};

/// Result of a create call that may race with another creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    Created,
    AlreadyExisted,
}

/// Opens sessions against a provisioning target
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    /// Human-readable target description for logs. Must not contain credentials.
    fn target(&self) -> String;

    /// Open a session and verify the target answers.
    /// No entity may be created or modified here.
    async fn connect(&self) -> Result<Self::Session, ProvisionError>;
}

/// A live connection to the target. Operations are issued one at a time.
#[async_trait]
pub trait Session: Send {
    /// Look up a user; returns its current role set when it exists.
    async fn find_user(
        &self,
        auth_database: &str,
        username: &str,
    ) -> Result<Option<BTreeSet<RoleGrant>>, ProvisionError>;

    /// Create a user with exactly `roles`.
    async fn create_user(
        &self,
        auth_database: &str,
        username: &str,
        password: &Secret,
        roles: &BTreeSet<RoleGrant>,
    ) -> Result<(), ProvisionError>;

    async fn collection_exists(&self, database: &str, name: &str) -> Result<bool, ProvisionError>;

    /// Create an empty collection
    async fn create_collection(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Creation, ProvisionError>;

    /// Release the connection. Called exactly once per session.
    async fn close(self) -> Result<(), ProvisionError>;
}
