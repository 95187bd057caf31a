//! The one capability the user reconciler needs from a MongoDB deployment:
//! run an administrative command against a named database.

use async_trait::async_trait;
use mongodb::bson::Document;
use mongodb::error::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// The server executed the command and rejected it
    #[error("server error {code} ({code_name}): {message}")]
    Server {
        code: i32,
        code_name: String,
        message: String,
    },

    /// The command completed without producing a reply document
    #[error("no matching document")]
    NoDocuments,

    #[error("transport error: {0}")]
    Transport(String),
}

impl DriverError {
    pub fn server(code: i32, code_name: impl Into<String>, message: impl Into<String>) -> Self {
        DriverError::Server {
            code,
            code_name: code_name.into(),
            message: message.into(),
        }
    }
}

impl From<mongodb::error::Error> for DriverError {
    fn from(error: mongodb::error::Error) -> Self {
        match *error.kind {
            ErrorKind::Command(ref command_error) => DriverError::Server {
                code: command_error.code,
                code_name: command_error.code_name.clone(),
                message: command_error.message.clone(),
            },
            _ => DriverError::Transport(error.to_string()),
        }
    }
}

/// Connection handle shared by every reconciliation.
///
/// Implementations must tolerate concurrent calls; nothing above this trait
/// takes a lock around it.
#[async_trait]
pub trait AdminCommandRunner: Send + Sync {
    async fn run_admin_command(
        &self,
        database: &str,
        command: Document,
    ) -> Result<Document, DriverError>;
}
