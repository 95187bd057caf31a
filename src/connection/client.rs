use crate::config::ProviderConfig;
use crate::connection::handle::{AdminCommandRunner, DriverError};
use crate::shared::security::redact_url;
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{AuthMechanism, ClientOptions, Credential};
use mongodb::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Application name reported to the server in the connection handshake
pub const APP_NAME: &str = "tfmongo";

/// Database used for the login check when no auth database is configured
pub const DEFAULT_AUTH_DATABASE: &str = "admin";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("MongoDB url is not set. Configure `url` for the provider or set MONGODB_URL")]
    MissingUrl,

    #[error("Invalid MongoDB url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to connect to provider at '{url}': {reason}")]
    Connect { url: String, reason: String },
}

/// Credential attached on top of the URL, when the provider config names a
/// login user. The mechanism is always SCRAM-SHA-256.
pub fn credential_for(config: &ProviderConfig) -> Option<Credential> {
    if config.auth_username.is_empty() {
        return None;
    }

    let mut credential = Credential::default();
    credential.mechanism = Some(AuthMechanism::ScramSha256);
    credential.username = Some(config.auth_username.clone());
    credential.password = Some(config.auth_password.clone());
    if !config.auth_database.is_empty() {
        credential.source = Some(config.auth_database.clone());
    }
    Some(credential)
}

/// Live handle to one MongoDB deployment.
///
/// `mongodb::Client` pools connections internally and is cheap to share, so
/// one `MongoConnection` (usually behind an `Arc`) serves every resource.
#[derive(Clone, Debug)]
pub struct MongoConnection {
    client: Client,
}

impl MongoConnection {
    /// Build a client from the provider configuration and verify the login
    /// with a `ping`.
    pub async fn connect(config: &ProviderConfig) -> Result<Self, ConnectionError> {
        let url = config.url.trim();
        if url.is_empty() {
            return Err(ConnectionError::MissingUrl);
        }
        let display_url = redact_url(url);

        info!(url = %display_url, "Connecting to MongoDB");

        let mut options =
            ClientOptions::parse(url)
                .await
                .map_err(|e| ConnectionError::InvalidUrl {
                    url: display_url.clone(),
                    reason: e.to_string(),
                })?;

        if let Some(credential) = credential_for(config) {
            debug!(
                username = %config.auth_username,
                auth_database = %config.auth_database,
                "Using SCRAM-SHA-256 credential from provider configuration"
            );
            options.credential = Some(credential);
        }

        let timeout = Duration::from_secs(config.connect_timeout_secs);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        if options.app_name.is_none() {
            options.app_name = Some(APP_NAME.to_string());
        }

        let client = Client::with_options(options).map_err(|e| ConnectionError::Connect {
            url: display_url.clone(),
            reason: e.to_string(),
        })?;

        let auth_database = if config.auth_database.is_empty() {
            DEFAULT_AUTH_DATABASE
        } else {
            config.auth_database.as_str()
        };
        if let Err(e) = client
            .database(auth_database)
            .run_command(doc! { "ping": 1 })
            .await
        {
            warn!(url = %display_url, error = %e, "MongoDB ping failed");
            return Err(ConnectionError::Connect {
                url: display_url,
                reason: e.to_string(),
            });
        }

        info!(url = %display_url, "Connected to MongoDB");
        Ok(Self { client })
    }
}

#[async_trait]
impl AdminCommandRunner for MongoConnection {
    async fn run_admin_command(
        &self,
        database: &str,
        command: Document,
    ) -> Result<Document, DriverError> {
        let reply = self.client.database(database).run_command(command).await?;
        if reply.is_empty() {
            return Err(DriverError::NoDocuments);
        }
        Ok(reply)
    }
}
