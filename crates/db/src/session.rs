use std::collections::BTreeSet;

use async_trait::async_trait;
use dbseed_kernel::{Creation, ProvisionError, RoleGrant, Secret, Session};
use mongodb::bson::{self, doc, Document};
use mongodb::Client;
use serde::Deserialize;

use crate::error::{classify, command_code, NAMESPACE_EXISTS};

#[derive(Debug, Deserialize)]
struct UsersInfoReply {
    #[serde(default)]
    users: Vec<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    roles: Vec<UserRole>,
}

#[derive(Debug, Deserialize)]
struct UserRole {
    role: String,
    db: String,
}

fn role_documents(roles: &BTreeSet<RoleGrant>) -> Vec<Document> {
    roles
        .iter()
        .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.database.as_str() })
        .collect()
}

/// Session over a connected [`Client`].
#[derive(Debug)]
pub struct MongoSession {
    client: Client,
}

impl MongoSession {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Session for MongoSession {
    #[tracing::instrument(skip(self), err)]
    async fn find_user(
        &self,
        auth_database: &str,
        username: &str,
    ) -> Result<Option<BTreeSet<RoleGrant>>, ProvisionError> {
        let reply = self
            .client
            .database(auth_database)
            .run_command(doc! { "usersInfo": { "user": username, "db": auth_database } })
            .await
            .map_err(classify)?;

        let reply: UsersInfoReply = bson::from_document(reply).map_err(|error| {
            ProvisionError::unknown(format!("unexpected usersInfo reply: {error}"))
        })?;

        Ok(reply.users.into_iter().next().map(|user| {
            user.roles
                .into_iter()
                .map(|role| RoleGrant::new(role.role, role.db))
                .collect()
        }))
    }

    #[tracing::instrument(skip(self, password), err)]
    async fn create_user(
        &self,
        auth_database: &str,
        username: &str,
        password: &Secret,
        roles: &BTreeSet<RoleGrant>,
    ) -> Result<(), ProvisionError> {
        self.client
            .database(auth_database)
            .run_command(doc! {
                "createUser": username,
                "pwd": password.expose(),
                "roles": role_documents(roles),
            })
            .await
            .map_err(classify)?;
        Ok(())
    }

    #[tracing::instrument(skip(self), err)]
    async fn collection_exists(&self, database: &str, name: &str) -> Result<bool, ProvisionError> {
        let names = self
            .client
            .database(database)
            .list_collection_names()
            .filter(doc! { "name": name })
            .await
            .map_err(classify)?;
        Ok(names.iter().any(|existing| existing == name))
    }

    #[tracing::instrument(skip(self), err)]
    async fn create_collection(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Creation, ProvisionError> {
        match self.client.database(database).create_collection(name).await {
            Ok(()) => Ok(Creation::Created),
            Err(error) if command_code(&error) == Some(NAMESPACE_EXISTS) => {
                Ok(Creation::AlreadyExisted)
            }
            Err(error) => Err(classify(error)),
        }
    }

    async fn close(self) -> Result<(), ProvisionError> {
        self.client.shutdown().await;
        tracing::debug!("disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_sent_in_mongo_shape() {
        let roles = BTreeSet::from([RoleGrant::new("readWrite", "mydatabase")]);
        assert_eq!(
            role_documents(&roles),
            vec![doc! { "role": "readWrite", "db": "mydatabase" }]
        );
    }

    #[test]
    fn users_info_reply_parses_roles() {
        let reply = doc! {
            "users": [{
                "_id": "admin.appuser",
                "user": "appuser",
                "db": "admin",
                "roles": [{ "role": "readWrite", "db": "mydatabase" }],
            }],
            "ok": 1.0,
        };

        let parsed: UsersInfoReply = bson::from_document(reply).unwrap();

        assert_eq!(parsed.users.len(), 1);
        assert_eq!(parsed.users[0].roles[0].role, "readWrite");
        assert_eq!(parsed.users[0].roles[0].db, "mydatabase");
    }

    #[test]
    fn empty_users_info_reply_means_absent() {
        let parsed: UsersInfoReply = bson::from_document(doc! { "users": [], "ok": 1.0 }).unwrap();
        assert!(parsed.users.is_empty());
    }
}
