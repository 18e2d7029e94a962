//! In-process provisioning target.
//!
//! Backs `--dry-run` (apply a spec to an empty database without touching a
//! real one) and lets tests inject unreachable targets, slow connects, and
//! permission failures.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::connector::{Connector, Creation, Session};
use crate::error::ProvisionError;
use crate::spec::{RoleGrant, Secret};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<(String, String), BTreeSet<RoleGrant>>,
    collections: BTreeSet<(String, String)>,
    unreachable: bool,
    connect_delay: Option<Duration>,
    denied_databases: BTreeSet<String>,
    sessions_opened: usize,
    sessions_closed: usize,
}

/// Shared handle to an in-memory database. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A target every connect attempt fails against.
    pub fn unreachable() -> Self {
        let connector = Self::new();
        connector.lock().unreachable = true;
        connector
    }

    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.lock().connect_delay = Some(delay);
        self
    }

    /// Reject every create issued against `database`.
    pub fn deny_writes_to(self, database: &str) -> Self {
        self.lock().denied_databases.insert(database.to_string());
        self
    }

    pub fn with_user(self, auth_database: &str, username: &str, roles: BTreeSet<RoleGrant>) -> Self {
        self.lock()
            .users
            .insert((auth_database.to_string(), username.to_string()), roles);
        self
    }

    pub fn with_collection(self, database: &str, name: &str) -> Self {
        self.lock()
            .collections
            .insert((database.to_string(), name.to_string()));
        self
    }

    pub fn user_roles(&self, auth_database: &str, username: &str) -> Option<BTreeSet<RoleGrant>> {
        self.lock()
            .users
            .get(&(auth_database.to_string(), username.to_string()))
            .cloned()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn has_collection(&self, database: &str, name: &str) -> bool {
        self.lock()
            .collections
            .contains(&(database.to_string(), name.to_string()))
    }

    pub fn collection_count(&self) -> usize {
        self.lock().collections.len()
    }

    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    /// Sessions opened but not yet closed.
    pub fn open_sessions(&self) -> usize {
        let state = self.lock();
        state.sessions_opened - state.sessions_closed
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Session = MemorySession;

    fn target(&self) -> String {
        "memory".to_string()
    }

    async fn connect(&self) -> Result<MemorySession, ProvisionError> {
        let delay = self.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.unreachable {
            return Err(ProvisionError::connection_failed(
                "in-memory target is marked unreachable",
            ));
        }
        state.sessions_opened += 1;

        Ok(MemorySession {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySession {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_writable(state: &MemoryState, database: &str) -> Result<(), ProvisionError> {
    if state.denied_databases.contains(database) {
        return Err(ProvisionError::permission_denied(format!(
            "not authorized on {database} to execute command"
        )));
    }
    Ok(())
}

#[async_trait]
impl Session for MemorySession {
    async fn find_user(
        &self,
        auth_database: &str,
        username: &str,
    ) -> Result<Option<BTreeSet<RoleGrant>>, ProvisionError> {
        Ok(self
            .lock()
            .users
            .get(&(auth_database.to_string(), username.to_string()))
            .cloned())
    }

    async fn create_user(
        &self,
        auth_database: &str,
        username: &str,
        _password: &Secret,
        roles: &BTreeSet<RoleGrant>,
    ) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        check_writable(&state, auth_database)?;

        let key = (auth_database.to_string(), username.to_string());
        if state.users.contains_key(&key) {
            return Err(ProvisionError::conflicting_definition(format!(
                "user {username}@{auth_database} already exists"
            )));
        }
        state.users.insert(key, roles.clone());
        Ok(())
    }

    async fn collection_exists(&self, database: &str, name: &str) -> Result<bool, ProvisionError> {
        Ok(self
            .lock()
            .collections
            .contains(&(database.to_string(), name.to_string())))
    }

    async fn create_collection(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Creation, ProvisionError> {
        let mut state = self.lock();
        check_writable(&state, database)?;

        if state
            .collections
            .insert((database.to_string(), name.to_string()))
        {
            Ok(Creation::Created)
        } else {
            Ok(Creation::AlreadyExisted)
        }
    }

    async fn close(self) -> Result<(), ProvisionError> {
        self.lock().sessions_closed += 1;
        Ok(())
    }
}
