use std::time::Duration;

use async_trait::async_trait;
use dbseed_kernel::settings::DatabaseSettings;
use dbseed_kernel::{Connector, ProvisionError};
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::Client;

use crate::error::classify;
use crate::session::MongoSession;

/// Build driver options from settings.
///
/// A configured `uri` wins; otherwise host, port and the optional
/// credentials are assembled directly so passwords need no URL escaping.
/// The connect timeout also bounds server selection so an unreachable
/// target fails within it.
pub async fn client_options(settings: &DatabaseSettings) -> Result<ClientOptions, ProvisionError> {
    let mut options = match &settings.uri {
        Some(uri) => ClientOptions::parse(uri).await.map_err(classify)?,
        None => {
            let mut options = ClientOptions::default();
            options.hosts = vec![ServerAddress::Tcp {
                host: settings.host.clone(),
                port: Some(settings.port),
            }];
            if let Some(username) = &settings.username {
                let mut credential = Credential::default();
                credential.username = Some(username.clone());
                credential.password = settings.password.clone();
                credential.source = Some(settings.auth_source.clone());
                options.credential = Some(credential);
            }
            options
        }
    };

    let timeout = Duration::from_millis(settings.connect_timeout_ms);
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);
    options.app_name = Some(settings.app_name.clone());

    Ok(options)
}

/// Connects to a MongoDB deployment described by [`DatabaseSettings`].
#[derive(Debug, Clone)]
pub struct MongoConnector {
    settings: DatabaseSettings,
}

impl MongoConnector {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Session = MongoSession;

    fn target(&self) -> String {
        self.settings.display_target()
    }

    #[tracing::instrument(skip(self), err, fields(target_db = %self.settings.display_target()))]
    async fn connect(&self) -> Result<MongoSession, ProvisionError> {
        let options = client_options(&self.settings).await?;
        let client = Client::with_options(options).map_err(classify)?;

        // The driver connects lazily; ping so an unreachable target fails
        // here rather than on the first ensure-action.
        if let Err(error) = client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
        {
            client.shutdown().await;
            return Err(ping_failure(classify(error)));
        }

        tracing::debug!("connected");
        Ok(MongoSession::new(client))
    }
}

/// A failed liveness ping is always a connection failure; the detail is
/// prefixed with the classified cause.
fn ping_failure(cause: ProvisionError) -> ProvisionError {
    ProvisionError::connection_failed(format!("{}: {}", cause.kind, cause.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbseed_kernel::ErrorKind;

    #[test]
    fn ping_failure_keeps_the_classified_cause() {
        let rejected = ping_failure(ProvisionError::permission_denied("Authentication failed."));
        assert_eq!(rejected.kind, ErrorKind::ConnectionFailed);
        assert_eq!(rejected.message, "permission_denied: Authentication failed.");

        let down = ping_failure(ProvisionError::connection_failed("Server selection timeout"));
        assert_eq!(down.message, "connection_failed: Server selection timeout");
    }

    #[tokio::test]
    async fn options_from_host_and_credentials() {
        let settings = DatabaseSettings {
            host: "mongo".to_string(),
            port: 27018,
            username: Some("root".to_string()),
            password: Some("p@ss:word".to_string()),
            connect_timeout_ms: 1500,
            ..DatabaseSettings::default()
        };

        let options = client_options(&settings).await.unwrap();

        assert_eq!(
            options.hosts,
            vec![ServerAddress::Tcp {
                host: "mongo".to_string(),
                port: Some(27018),
            }]
        );
        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("root"));
        assert_eq!(credential.password.as_deref(), Some("p@ss:word"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
        assert_eq!(options.connect_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(
            options.server_selection_timeout,
            Some(Duration::from_millis(1500))
        );
        assert_eq!(options.app_name.as_deref(), Some("dbseed"));
    }

    #[tokio::test]
    async fn anonymous_when_no_username() {
        let options = client_options(&DatabaseSettings::default()).await.unwrap();
        assert!(options.credential.is_none());
    }

    #[tokio::test]
    async fn uri_takes_precedence_over_host() {
        let settings = DatabaseSettings {
            uri: Some("mongodb://db.internal:27019/".to_string()),
            host: "ignored".to_string(),
            ..DatabaseSettings::default()
        };

        let options = client_options(&settings).await.unwrap();

        assert_eq!(
            options.hosts,
            vec![ServerAddress::Tcp {
                host: "db.internal".to_string(),
                port: Some(27019),
            }]
        );
    }

    #[tokio::test]
    async fn malformed_uri_is_rejected() {
        let settings = DatabaseSettings {
            uri: Some("postgres://nope".to_string()),
            ..DatabaseSettings::default()
        };
        assert!(client_options(&settings).await.is_err());
    }
}
