//! In-memory stand-in for the admin-command surface of a MongoDB deployment.

#![allow(dead_code)]

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tfmongo::connection::{AdminCommandRunner, DriverError};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredUser {
    pub password: String,
    pub roles: Vec<(String, String)>,
    pub restrictions: usize,
}

/// Users keyed by `(database, username)`, answering createUser, updateUser,
/// dropUser and usersInfo the way a server does
#[derive(Default)]
pub struct InMemoryMongo {
    users: RwLock<HashMap<(String, String), StoredUser>>,
    injected: Mutex<VecDeque<Result<Document, DriverError>>>,
    latency: Option<Duration>,
    commands: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryMongo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command sleeps for `latency` while counted as in flight
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Answer the next command with `reply` instead of executing it
    pub fn inject(&self, reply: Result<Document, DriverError>) {
        self.injected.lock().unwrap().push_back(reply);
    }

    pub async fn user(&self, database: &str, username: &str) -> Option<StoredUser> {
        self.users
            .read()
            .await
            .get(&(database.to_string(), username.to_string()))
            .cloned()
    }

    /// Role names granted to a user, as stored
    pub async fn user_roles(&self, database: &str, username: &str) -> Vec<String> {
        self.user(database, username)
            .await
            .map(|user| user.roles.into_iter().map(|(role, _)| role).collect())
            .unwrap_or_default()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    pub fn command_count(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn execute(&self, database: &str, command: &Document) -> Result<Document, DriverError> {
        let (name, target) = match command.iter().next() {
            Some((name, Bson::String(target))) => (name.as_str(), target.clone()),
            _ => return Err(DriverError::server(59, "CommandNotFound", "no such command")),
        };
        let key = (database.to_string(), target.clone());

        match name {
            "createUser" => {
                let mut users = self.users.write().await;
                if users.contains_key(&key) {
                    return Err(DriverError::server(
                        51003,
                        "Location51003",
                        format!("User \"{}@{}\" already exists", target, database),
                    ));
                }
                users.insert(key, stored_user(command));
                Ok(doc! { "ok": 1.0 })
            }
            "updateUser" => {
                let mut users = self.users.write().await;
                match users.get_mut(&key) {
                    Some(existing) => {
                        *existing = stored_user(command);
                        Ok(doc! { "ok": 1.0 })
                    }
                    None => Err(user_not_found(&target, database)),
                }
            }
            "dropUser" => match self.users.write().await.remove(&key) {
                Some(_) => Ok(doc! { "ok": 1.0 }),
                None => Err(user_not_found(&target, database)),
            },
            "usersInfo" => {
                let users = self.users.read().await;
                let listed: Vec<Bson> = users
                    .get(&key)
                    .map(|user| {
                        let roles: Vec<Bson> = user
                            .roles
                            .iter()
                            .map(|(role, db)| {
                                Bson::Document(doc! { "role": role.as_str(), "db": db.as_str() })
                            })
                            .collect();
                        vec![Bson::Document(doc! {
                            "_id": format!("{}.{}", database, target),
                            "user": target.as_str(),
                            "db": database,
                            "roles": roles,
                            "mechanisms": ["SCRAM-SHA-256"],
                        })]
                    })
                    .unwrap_or_default();
                Ok(doc! { "users": listed, "ok": 1.0 })
            }
            other => Err(DriverError::server(
                59,
                "CommandNotFound",
                format!("no such command: '{}'", other),
            )),
        }
    }
}

fn user_not_found(username: &str, database: &str) -> DriverError {
    DriverError::server(
        11,
        "UserNotFound",
        format!("Could not find user \"{}@{}\"", username, database),
    )
}

fn stored_user(command: &Document) -> StoredUser {
    let roles: Vec<(String, String)> = command
        .get_array("roles")
        .map(|roles| {
            roles
                .iter()
                .filter_map(|role| role.as_document())
                .filter_map(|role| {
                    Some((
                        role.get_str("role").ok()?.to_string(),
                        role.get_str("db").ok()?.to_string(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    StoredUser {
        password: command.get_str("pwd").unwrap_or_default().to_string(),
        roles,
        restrictions: command
            .get_array("authenticationRestrictions")
            .map(|r| r.len())
            .unwrap_or_default(),
    }
}

#[async_trait]
impl AdminCommandRunner for InMemoryMongo {
    async fn run_admin_command(
        &self,
        database: &str,
        command: Document,
    ) -> Result<Document, DriverError> {
        self.commands.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let injected = self.injected.lock().unwrap().pop_front();
        let reply = match injected {
            Some(reply) => reply,
            None => self.execute(database, &command).await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
