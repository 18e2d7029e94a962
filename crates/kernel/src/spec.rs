//! Declarative provisioning spec: the ordered list of ensure-actions a
//! bootstrap run applies.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::SpecError;

const DEFAULT_AUTH_DATABASE: &str = "admin";
const MAX_DATABASE_NAME_BYTES: usize = 63;
const DATABASE_NAME_FORBIDDEN: &[char] = &[
    '/', '\\', '.', '"', '$', '*', '<', '>', ':', '|', '?', ' ', '\0',
];

/// A password that never shows up in `Debug` output or serialized results.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    const REDACTED: &'static str = "********";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plain-text value, for handing to the database driver only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&Self::REDACTED).finish()
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::REDACTED)
    }
}

/// A role granted to a user, scoped to one database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    pub database: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            database: database.into(),
        }
    }
}

impl fmt::Display for RoleGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.database)
    }
}

/// A single idempotent "create if absent" step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    EnsureUser {
        username: String,
        password: Secret,
        /// Database the user is defined in.
        #[serde(default = "default_auth_database")]
        auth_database: String,
        #[serde(default)]
        roles: BTreeSet<RoleGrant>,
    },
    EnsureCollection {
        database: String,
        name: String,
    },
}

fn default_auth_database() -> String {
    DEFAULT_AUTH_DATABASE.to_string()
}

impl Action {
    pub fn ensure_user<I>(username: &str, password: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = RoleGrant>,
    {
        Self::EnsureUser {
            username: username.to_string(),
            password: Secret::new(password),
            auth_database: default_auth_database(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn ensure_collection(database: &str, name: &str) -> Self {
        Self::EnsureCollection {
            database: database.to_string(),
            name: name.to_string(),
        }
    }

    /// Short tag used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::EnsureUser { .. } => "ensure_user",
            Action::EnsureCollection { .. } => "ensure_collection",
        }
    }

    /// Fully qualified name of the entity the action ensures.
    pub fn subject(&self) -> String {
        match self {
            Action::EnsureUser {
                username,
                auth_database,
                ..
            } => format!("{username}@{auth_database}"),
            Action::EnsureCollection { database, name } => format!("{database}.{name}"),
        }
    }

    fn validate(&self, index: usize) -> Result<(), SpecError> {
        match self {
            Action::EnsureUser {
                username,
                password,
                auth_database,
                roles,
            } => {
                if username.trim().is_empty() {
                    return Err(SpecError::invalid(index, "username must not be empty"));
                }
                if password.expose().is_empty() {
                    return Err(SpecError::invalid(
                        index,
                        format!("password for user '{username}' must not be empty"),
                    ));
                }
                validate_database_name(index, auth_database)?;
                for grant in roles {
                    if grant.role.trim().is_empty() {
                        return Err(SpecError::invalid(
                            index,
                            format!("user '{username}' has a role with an empty name"),
                        ));
                    }
                    validate_database_name(index, &grant.database)?;
                }
                Ok(())
            }
            Action::EnsureCollection { database, name } => {
                validate_database_name(index, database)?;
                validate_collection_name(index, name)
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.subject())
    }
}

fn validate_database_name(index: usize, name: &str) -> Result<(), SpecError> {
    if name.is_empty() {
        return Err(SpecError::invalid(index, "database name must not be empty"));
    }
    if name.len() > MAX_DATABASE_NAME_BYTES {
        return Err(SpecError::invalid(
            index,
            format!("database name '{name}' exceeds {MAX_DATABASE_NAME_BYTES} bytes"),
        ));
    }
    if let Some(c) = name.chars().find(|c| DATABASE_NAME_FORBIDDEN.contains(c)) {
        return Err(SpecError::invalid(
            index,
            format!("database name '{name}' contains forbidden character {c:?}"),
        ));
    }
    Ok(())
}

fn validate_collection_name(index: usize, name: &str) -> Result<(), SpecError> {
    if name.is_empty() {
        return Err(SpecError::invalid(index, "collection name must not be empty"));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(SpecError::invalid(
            index,
            format!("collection name '{name}' contains '$' or NUL"),
        ));
    }
    if name.starts_with("system.") {
        return Err(SpecError::invalid(
            index,
            format!("collection name '{name}' is in the reserved system namespace"),
        ));
    }
    Ok(())
}

/// Per-action checks, plus: a user may be declared more than once only
/// with the same role set.
fn validate_actions(actions: &[Action]) -> Result<(), SpecError> {
    let mut declared_users: HashMap<(&str, &str), &BTreeSet<RoleGrant>> = HashMap::new();

    for (index, action) in actions.iter().enumerate() {
        action.validate(index)?;

        if let Action::EnsureUser {
            username,
            auth_database,
            roles,
            ..
        } = action
        {
            match declared_users.get(&(auth_database.as_str(), username.as_str())) {
                Some(previous) if *previous != roles => {
                    return Err(SpecError::invalid(
                        index,
                        format!(
                            "user '{username}@{auth_database}' is declared again with different roles"
                        ),
                    ));
                }
                Some(_) => {}
                None => {
                    declared_users.insert((auth_database.as_str(), username.as_str()), roles);
                }
            }
        }
    }

    Ok(())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpec {
    #[serde(default)]
    actions: Vec<Action>,
}

/// Ordered, validated, immutable list of ensure-actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningSpec {
    actions: Vec<Action>,
}

impl ProvisioningSpec {
    /// Validate `actions` and freeze them into a spec.
    pub fn new(actions: Vec<Action>) -> Result<Self, SpecError> {
        validate_actions(&actions)?;
        Ok(Self { actions })
    }

    pub fn from_json_str(input: &str) -> Result<Self, SpecError> {
        let raw: RawSpec = serde_json::from_str(input)?;
        Self::new(raw.actions)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SpecError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub(crate) fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INIT_SPEC: &str = r#"{
        "actions": [
            {
                "kind": "ensure_user",
                "username": "appuser",
                "password": "apppassword",
                "roles": [{ "role": "readWrite", "database": "mydatabase" }]
            },
            { "kind": "ensure_collection", "database": "mydatabase", "name": "test" }
        ]
    }"#;

    #[test]
    fn parses_actions_in_declared_order() {
        let spec = ProvisioningSpec::from_json_str(INIT_SPEC).unwrap();

        assert_eq!(spec.len(), 2);
        assert_eq!(
            spec.actions()[0],
            Action::ensure_user(
                "appuser",
                "apppassword",
                [RoleGrant::new("readWrite", "mydatabase")]
            )
        );
        assert_eq!(
            spec.actions()[1],
            Action::ensure_collection("mydatabase", "test")
        );
    }

    #[test]
    fn auth_database_defaults_to_admin() {
        let spec = ProvisioningSpec::from_json_str(INIT_SPEC).unwrap();
        match &spec.actions()[0] {
            Action::EnsureUser { auth_database, .. } => assert_eq!(auth_database, "admin"),
            other => panic!("expected EnsureUser, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_roles_collapse_into_a_set() {
        let spec = ProvisioningSpec::from_json_str(
            r#"{"actions": [{
                "kind": "ensure_user", "username": "u", "password": "p",
                "roles": [
                    {"role": "read", "database": "db"},
                    {"role": "read", "database": "db"}
                ]
            }]}"#,
        )
        .unwrap();

        match &spec.actions()[0] {
            Action::EnsureUser { roles, .. } => assert_eq!(roles.len(), 1),
            other => panic!("expected EnsureUser, got {other:?}"),
        }
    }

    #[test]
    fn empty_spec_is_valid() {
        let spec = ProvisioningSpec::from_json_str(r#"{"actions": []}"#).unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn rejects_unknown_action_kind() {
        let err = ProvisioningSpec::from_json_str(
            r#"{"actions": [{"kind": "drop_database", "database": "x"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::Parse(_)));
    }

    #[test]
    fn rejects_empty_password() {
        let err = ProvisioningSpec::new(vec![Action::ensure_user("appuser", "", [])]).unwrap_err();
        assert!(matches!(err, SpecError::Invalid { index: 0, .. }));
    }

    #[test]
    fn rejects_invalid_database_names() {
        let too_long = "x".repeat(64);
        for name in ["", "my.db", "my db", "a$b", too_long.as_str()] {
            let err = ProvisioningSpec::new(vec![Action::ensure_collection(name, "test")]);
            assert!(err.is_err(), "database name {name:?} should be rejected");
        }
    }

    #[test]
    fn rejects_system_collection_names() {
        let err = ProvisioningSpec::new(vec![
            Action::ensure_collection("mydatabase", "test"),
            Action::ensure_collection("mydatabase", "system.users"),
        ])
        .unwrap_err();
        assert!(matches!(err, SpecError::Invalid { index: 1, .. }));
    }

    #[test]
    fn rejects_same_user_declared_with_different_roles() {
        let err = ProvisioningSpec::new(vec![
            Action::ensure_user("appuser", "pw", [RoleGrant::new("read", "mydatabase")]),
            Action::ensure_user("appuser", "pw", [RoleGrant::new("readWrite", "mydatabase")]),
        ])
        .unwrap_err();
        assert!(matches!(err, SpecError::Invalid { index: 1, .. }));
    }

    #[test]
    fn repeated_identical_user_is_allowed() {
        let user = Action::ensure_user("appuser", "pw", [RoleGrant::new("read", "mydatabase")]);
        let spec = ProvisioningSpec::new(vec![user.clone(), user]).unwrap();
        assert_eq!(spec.len(), 2);
    }

    #[test]
    fn password_is_redacted_in_debug_and_json() {
        let action = Action::ensure_user("appuser", "apppassword", []);

        let debug = format!("{action:?}");
        let json = serde_json::to_string(&action).unwrap();

        assert!(!debug.contains("apppassword"));
        assert!(!json.contains("apppassword"));
        assert!(json.contains("\"kind\":\"ensure_user\""));
    }

    #[test]
    fn display_names_kind_and_subject() {
        assert_eq!(
            Action::ensure_collection("mydatabase", "test").to_string(),
            "ensure_collection mydatabase.test"
        );
        assert_eq!(
            Action::ensure_user("appuser", "pw", []).to_string(),
            "ensure_user appuser@admin"
        );
    }
}
