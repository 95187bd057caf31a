//! Lifecycle of one `mongodb_user` resource: every operation builds a single
//! administrative command, sends it over the shared handle, decodes the reply
//! and maps the outcome onto a typed result. Nothing here retries, locks or
//! decides between create and update; that is the caller's job.

use crate::connection::handle::{AdminCommandRunner, DriverError};
use crate::user::command::{self, AdminCommand};
use crate::user::model::{CommandOutput, Identity, ObservedUser, UserSpec, UsersInfo};
use crate::user::translate::{translate_auth_restrictions, translate_roles, RestrictionParseError};
use mongodb::bson::{from_document, Document};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a single admin command did not succeed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandFailure {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("server replied with ok: {0}")]
    NotAcknowledged(f64),

    #[error("unable to decode reply: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UserError {
    #[error("Invalid mongodb_user configuration: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Restrictions(#[from] RestrictionParseError),

    #[error("Failed to run {command} for user: {username}. Roles: {roles:?}. Error: {cause}")]
    Command {
        command: AdminCommand,
        username: String,
        roles: Vec<String>,
        cause: CommandFailure,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("Invalid mongodb_user configuration: {0}")]
    InvalidSpec(String),

    /// The usersInfo command itself failed
    #[error("Failed to run usersInfo for user: {username}. Error: {cause}")]
    Command {
        username: String,
        cause: CommandFailure,
    },

    /// The command succeeded but listed no such user
    #[error("Username: {username} was not found in list of users returned by MongoDB. Must create new user")]
    NotFound { username: String },
}

/// Either failure, for drivers that chain lookups and writes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Observed state of a resource, computed from its declaration alone
pub fn read(spec: &UserSpec) -> ObservedUser {
    ObservedUser {
        id: spec.identity(),
        username: spec.username.clone(),
        password: spec.password.clone(),
    }
}

fn decode<T: DeserializeOwned>(reply: Document) -> Result<T, CommandFailure> {
    from_document(reply).map_err(|e| CommandFailure::Decode(e.to_string()))
}

pub struct UserReconciler<R> {
    runner: Arc<R>,
}

impl<R> Clone for UserReconciler<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
        }
    }
}

impl<R: AdminCommandRunner> UserReconciler<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    /// Send `createUser`; succeeds iff the server acknowledges with `ok: 1`.
    /// Creating a user that already exists fails on the server side.
    pub async fn create(&self, spec: &UserSpec) -> Result<Identity, UserError> {
        spec.validate().map_err(UserError::InvalidSpec)?;
        let roles = translate_roles(&spec.roles, &spec.database);
        let restrictions =
            translate_auth_restrictions(spec.authentication_restrictions.as_deref())?;

        let document = command::create_user(&spec.username, &spec.password, &roles, &restrictions);
        self.run_acknowledged(AdminCommand::CreateUser, spec, document)
            .await
            .map_err(|cause| command_failed(AdminCommand::CreateUser, spec, cause))?;

        let identity = spec.identity();
        info!(id = %identity, roles = roles.len(), "Created MongoDB user");
        Ok(identity)
    }

    /// Send `updateUser` with the complete user document. A reply carrying no
    /// document is accepted.
    pub async fn update(&self, spec: &UserSpec) -> Result<Identity, UserError> {
        spec.validate().map_err(UserError::InvalidSpec)?;
        let roles = translate_roles(&spec.roles, &spec.database);
        let restrictions =
            translate_auth_restrictions(spec.authentication_restrictions.as_deref())?;

        let document = command::update_user(&spec.username, &spec.password, &roles, &restrictions);
        match self
            .run_acknowledged(AdminCommand::UpdateUser, spec, document)
            .await
        {
            Ok(()) => {}
            Err(CommandFailure::Driver(DriverError::NoDocuments)) => {
                debug!(
                    database = %spec.database,
                    username = %spec.username,
                    "updateUser returned no document, treating as success"
                );
            }
            Err(cause) => return Err(command_failed(AdminCommand::UpdateUser, spec, cause)),
        }

        let identity = spec.identity();
        info!(id = %identity, roles = roles.len(), "Updated MongoDB user");
        Ok(identity)
    }

    /// Send `dropUser`; succeeds iff the server acknowledges with `ok: 1`.
    pub async fn delete(&self, spec: &UserSpec) -> Result<(), UserError> {
        spec.validate_identity().map_err(UserError::InvalidSpec)?;

        let document = command::drop_user(&spec.username);
        self.run_acknowledged(AdminCommand::DropUser, spec, document)
            .await
            .map_err(|cause| command_failed(AdminCommand::DropUser, spec, cause))?;

        info!(id = %spec.identity(), "Dropped MongoDB user");
        Ok(())
    }

    /// Raw `usersInfo` reply for the spec's username
    pub async fn users_info(&self, spec: &UserSpec) -> Result<UsersInfo, LookupError> {
        spec.validate_identity().map_err(LookupError::InvalidSpec)?;

        let lookup_failed = |cause: CommandFailure| LookupError::Command {
            username: spec.username.clone(),
            cause,
        };

        debug!(
            command = %AdminCommand::UsersInfo,
            database = %spec.database,
            username = %spec.username,
            "Sending admin command"
        );
        let reply = self
            .runner
            .run_admin_command(&spec.database, command::users_info(&spec.username))
            .await
            .map_err(|e| lookup_failed(e.into()))?;

        let info: UsersInfo = decode(reply).map_err(lookup_failed)?;
        if !info.is_ok() {
            return Err(lookup_failed(CommandFailure::NotAcknowledged(info.ok)));
        }
        Ok(info)
    }

    /// Whether the server lists a user with exactly this name. "Not found"
    /// is `Ok(false)`; errors are reserved for failed or undecodable lookups.
    pub async fn exists(&self, spec: &UserSpec) -> Result<bool, LookupError> {
        let info = match self.users_info(spec).await {
            Ok(info) => info,
            Err(e) => {
                warn!(id = %spec.identity(), error = %e, "User lookup failed");
                return Err(e);
            }
        };
        let found = info.find(&spec.username).is_some();
        debug!(id = %spec.identity(), found, "Checked MongoDB user existence");
        Ok(found)
    }

    /// Like [`exists`](Self::exists), but a missing user is an error
    pub async fn require(&self, spec: &UserSpec) -> Result<(), LookupError> {
        if self.exists(spec).await? {
            Ok(())
        } else {
            Err(LookupError::NotFound {
                username: spec.username.clone(),
            })
        }
    }

    async fn run_acknowledged(
        &self,
        kind: AdminCommand,
        spec: &UserSpec,
        document: Document,
    ) -> Result<(), CommandFailure> {
        // the document carries the password, only its coordinates are logged
        debug!(
            command = %kind,
            database = %spec.database,
            username = %spec.username,
            "Sending admin command"
        );

        let reply = self.runner.run_admin_command(&spec.database, document).await?;
        let output: CommandOutput = decode(reply)?;
        if output.is_ok() {
            Ok(())
        } else {
            Err(CommandFailure::NotAcknowledged(output.ok))
        }
    }
}

/// Wrap a failed write and report it; roles only matter for create/update
fn command_failed(kind: AdminCommand, spec: &UserSpec, cause: CommandFailure) -> UserError {
    let error = UserError::Command {
        command: kind,
        username: spec.username.clone(),
        roles: match kind {
            AdminCommand::CreateUser | AdminCommand::UpdateUser => spec.role_names(),
            _ => Vec::new(),
        },
        cause,
    };
    warn!(command = %kind, id = %spec.identity(), error = %error, "Admin command failed");
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::logging::capture;
    use async_trait::async_trait;
    use mongodb::bson::doc;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every command and answers from a queue of canned replies
    #[derive(Default)]
    struct ScriptedRunner {
        replies: Mutex<VecDeque<Result<Document, DriverError>>>,
        sent: Mutex<Vec<(String, Document)>>,
    }

    impl ScriptedRunner {
        fn replying(replies: Vec<Result<Document, DriverError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<(String, Document)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AdminCommandRunner for ScriptedRunner {
        async fn run_admin_command(
            &self,
            database: &str,
            command: Document,
        ) -> Result<Document, DriverError> {
            self.sent
                .lock()
                .unwrap()
                .push((database.to_string(), command));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DriverError::Transport("no scripted reply".to_string())))
        }
    }

    fn alice() -> UserSpec {
        UserSpec::new("app", "alice", "p1").with_roles(["readWrite"])
    }

    #[tokio::test]
    async fn test_create_sends_full_document() {
        let runner = ScriptedRunner::replying(vec![Ok(doc! { "ok": 1.0 })]);
        let reconciler = UserReconciler::new(runner.clone());

        let identity = reconciler.create(&alice()).await.unwrap();
        assert_eq!(identity.as_str(), "app.alice");

        let sent = runner.sent();
        assert_eq!(sent.len(), 1);
        let (database, command) = &sent[0];
        assert_eq!(database, "app");
        assert_eq!(
            command,
            &doc! {
                "createUser": "alice",
                "pwd": "p1",
                "roles": [{"role": "readWrite", "db": "app"}],
                "authenticationRestrictions": [],
            }
        );
    }

    #[tokio::test]
    async fn test_create_not_acknowledged() {
        let runner = ScriptedRunner::replying(vec![Ok(doc! { "ok": 0.0 })]);
        let reconciler = UserReconciler::new(runner);

        let error = reconciler.create(&alice()).await.unwrap_err();
        assert_eq!(
            error,
            UserError::Command {
                command: AdminCommand::CreateUser,
                username: "alice".to_string(),
                roles: vec!["readWrite".to_string()],
                cause: CommandFailure::NotAcknowledged(0.0),
            }
        );
        let message = error.to_string();
        assert!(message.contains("createUser"));
        assert!(message.contains("alice"));
        assert!(message.contains("readWrite"));
    }

    #[tokio::test]
    async fn test_create_server_error_carries_cause() {
        let runner = ScriptedRunner::replying(vec![Err(DriverError::server(
            51003,
            "Location51003",
            "User \"alice@app\" already exists",
        ))]);
        let reconciler = UserReconciler::new(runner);

        match reconciler.create(&alice()).await {
            Err(UserError::Command {
                cause: CommandFailure::Driver(DriverError::Server { code, .. }),
                ..
            }) => assert_eq!(code, 51003),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_with_bad_restrictions_sends_nothing() {
        let runner = ScriptedRunner::replying(vec![]);
        let reconciler = UserReconciler::new(runner.clone());
        let spec = alice().with_authentication_restrictions("not json");

        let error = reconciler.create(&spec).await.unwrap_err();
        assert!(matches!(error, UserError::Restrictions(_)));
        assert!(runner.sent().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_spec() {
        let runner = ScriptedRunner::replying(vec![]);
        let reconciler = UserReconciler::new(runner.clone());

        let error = reconciler
            .create(&UserSpec::new("app", "alice", ""))
            .await
            .unwrap_err();
        assert!(matches!(error, UserError::InvalidSpec(_)));
        assert!(runner.sent().is_empty());
    }

    #[tokio::test]
    async fn test_update_accepts_no_documents() {
        let runner = ScriptedRunner::replying(vec![Err(DriverError::NoDocuments)]);
        let reconciler = UserReconciler::new(runner.clone());

        let identity = reconciler.update(&alice()).await.unwrap();
        assert_eq!(identity.to_string(), "app.alice");
        assert_eq!(
            AdminCommand::of(&runner.sent()[0].1),
            Some(AdminCommand::UpdateUser)
        );
    }

    #[tokio::test]
    async fn test_update_fails_on_other_errors() {
        let runner = ScriptedRunner::replying(vec![Err(DriverError::server(
            11,
            "UserNotFound",
            "Could not find user \"alice@app\"",
        ))]);
        let reconciler = UserReconciler::new(runner);

        let error = reconciler.update(&alice()).await.unwrap_err();
        assert!(matches!(
            error,
            UserError::Command {
                command: AdminCommand::UpdateUser,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_update_not_acknowledged_fails() {
        let runner = ScriptedRunner::replying(vec![Ok(doc! { "ok": 0.0 })]);
        let reconciler = UserReconciler::new(runner);

        assert_eq!(
            reconciler.update(&alice()).await,
            Err(UserError::Command {
                command: AdminCommand::UpdateUser,
                username: "alice".to_string(),
                roles: vec!["readWrite".to_string()],
                cause: CommandFailure::NotAcknowledged(0.0),
            })
        );
    }

    #[tokio::test]
    async fn test_no_documents_is_only_tolerated_by_update() {
        let runner = ScriptedRunner::replying(vec![
            Err(DriverError::NoDocuments),
            Err(DriverError::NoDocuments),
            Err(DriverError::NoDocuments),
        ]);
        let reconciler = UserReconciler::new(runner);
        let (_guard, captured) = capture::warnings();

        assert!(reconciler.update(&alice()).await.is_ok());
        assert!(captured.warnings().is_empty());

        assert!(matches!(
            reconciler.create(&alice()).await,
            Err(UserError::Command {
                cause: CommandFailure::Driver(DriverError::NoDocuments),
                ..
            })
        ));
        assert!(reconciler.delete(&alice()).await.is_err());
        assert_eq!(captured.warnings().len(), 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let runner = ScriptedRunner::replying(vec![Ok(doc! { "ok": 1.0 })]);
        let reconciler = UserReconciler::new(runner.clone());

        reconciler.delete(&alice()).await.unwrap();
        assert_eq!(runner.sent()[0].1, doc! { "dropUser": "alice" });
    }

    #[tokio::test]
    async fn test_delete_failure_has_no_roles() {
        let runner = ScriptedRunner::replying(vec![Err(DriverError::Transport(
            "connection reset".to_string(),
        ))]);
        let reconciler = UserReconciler::new(runner);

        match reconciler.delete(&alice()).await {
            Err(UserError::Command { command, roles, .. }) => {
                assert_eq!(command, AdminCommand::DropUser);
                assert!(roles.is_empty());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exists_matches_any_entry() {
        let runner = ScriptedRunner::replying(vec![Ok(doc! {
            "users": [{"user": "alice2"}, {"user": "alice"}],
            "ok": 1.0,
        })]);
        let reconciler = UserReconciler::new(runner.clone());

        assert!(reconciler.exists(&alice()).await.unwrap());
        assert_eq!(runner.sent()[0].1, doc! { "usersInfo": "alice" });
    }

    #[tokio::test]
    async fn test_exists_false_when_not_listed() {
        let runner = ScriptedRunner::replying(vec![
            Ok(doc! { "users": [], "ok": 1.0 }),
            Ok(doc! { "users": [{"user": "bob"}], "ok": 1.0 }),
        ]);
        let reconciler = UserReconciler::new(runner);

        assert!(!reconciler.exists(&alice()).await.unwrap());
        assert!(!reconciler.exists(&alice()).await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_failures_are_distinguishable() {
        let runner = ScriptedRunner::replying(vec![
            Err(DriverError::Transport("timed out".to_string())),
            Ok(doc! { "users": [], "ok": 1.0 }),
        ]);
        let reconciler = UserReconciler::new(runner);

        assert!(matches!(
            reconciler.require(&alice()).await,
            Err(LookupError::Command { .. })
        ));
        assert_eq!(
            reconciler.require(&alice()).await,
            Err(LookupError::NotFound {
                username: "alice".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_unacknowledged_lookup_is_not_not_found() {
        let runner = ScriptedRunner::replying(vec![
            Ok(doc! { "users": [], "ok": 0.0 }),
            Ok(doc! { "users": [], "ok": 0.0 }),
        ]);
        let reconciler = UserReconciler::new(runner);

        assert_eq!(
            reconciler.exists(&alice()).await,
            Err(LookupError::Command {
                username: "alice".to_string(),
                cause: CommandFailure::NotAcknowledged(0.0),
            })
        );
        assert!(matches!(
            reconciler.users_info(&alice()).await,
            Err(LookupError::Command {
                cause: CommandFailure::NotAcknowledged(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_exists_decode_failure() {
        let runner = ScriptedRunner::replying(vec![Ok(doc! { "users": "alice", "ok": 1.0 })]);
        let reconciler = UserReconciler::new(runner);

        assert!(matches!(
            reconciler.exists(&alice()).await,
            Err(LookupError::Command {
                cause: CommandFailure::Decode(_),
                ..
            })
        ));
    }

    #[test]
    fn test_read_echoes_declaration() {
        let observed = read(&alice());
        assert_eq!(observed.id.as_str(), "app.alice");
        assert_eq!(observed.username, "alice");
        assert_eq!(observed.password, "p1");
    }
}
