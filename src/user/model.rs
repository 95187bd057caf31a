use crate::shared::security::mask_secret;
use mongodb::bson::{doc, Bson};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Declared configuration of one `mongodb_user` resource
#[derive(Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct UserSpec {
    /// Database the user is created in. Changing it replaces the user.
    pub database: String,
    /// Name of the user. Changing it replaces the user.
    pub username: String,
    /// Password of the user
    pub password: String,
    /// Role names granted on `database`
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// JSON list of `{"clientSource": [...], "serverAddress": [...]}` entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_restrictions: Option<String>,
}

impl fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSpec")
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &mask_secret(&self.password))
            .field("roles", &self.roles)
            .field(
                "authentication_restrictions",
                &self.authentication_restrictions,
            )
            .finish()
    }
}

impl UserSpec {
    pub fn new(
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            username: username.into(),
            password: password.into(),
            roles: BTreeSet::new(),
            authentication_restrictions: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_authentication_restrictions(mut self, raw: impl Into<String>) -> Self {
        self.authentication_restrictions = Some(raw.into());
        self
    }

    pub fn identity(&self) -> Identity {
        Identity::new(&self.database, &self.username)
    }

    /// Role names in the order they are sent to the server
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().cloned().collect()
    }

    /// Checks needed to address the user at all
    pub fn validate_identity(&self) -> Result<(), String> {
        if self.database.trim().is_empty() {
            return Err("`database` must not be empty".to_string());
        }
        if self.username.trim().is_empty() {
            return Err("`username` must not be empty".to_string());
        }
        Ok(())
    }

    /// Checks needed before the user document is written
    pub fn validate(&self) -> Result<(), String> {
        self.validate_identity()?;
        if self.password.is_empty() {
            return Err(format!(
                "`password` must not be empty for user {}",
                self.username
            ));
        }
        if self.roles.iter().any(|role| role.trim().is_empty()) {
            return Err(format!(
                "`roles` must not contain empty role names for user {}",
                self.username
            ));
        }
        Ok(())
    }
}

/// Resource identity, `"<database>.<username>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(database: &str, username: &str) -> Self {
        Identity(format!("{}.{}", database, username))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split back into `(database, username)`. Database names cannot contain
    /// a dot, so the first one is the separator.
    pub fn parts(&self) -> (&str, &str) {
        self.0.split_once('.').unwrap_or((self.0.as_str(), ""))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((database, username)) if !database.is_empty() && !username.is_empty() => {
                Ok(Identity::new(database, username))
            }
            _ => Err(format!(
                "Invalid identity '{}': expected <database>.<username>",
                s
            )),
        }
    }
}

/// `{role, db}` entry of a user's role list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDocument {
    pub role: String,
    pub db: String,
}

impl From<RoleDocument> for Bson {
    fn from(role: RoleDocument) -> Bson {
        Bson::Document(doc! {
            "role": role.role,
            "db": role.db,
        })
    }
}

/// One `authenticationRestrictions` entry. Unknown keys are rejected so a
/// misspelled restriction never reaches the server as an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RestrictionDocument {
    #[serde(alias = "ClientSource", alias = "clientsource", alias = "client_source")]
    pub client_source: Vec<String>,
    #[serde(alias = "ServerAddress", alias = "serveraddress", alias = "server_address")]
    pub server_address: Vec<String>,
}

impl From<RestrictionDocument> for Bson {
    fn from(restriction: RestrictionDocument) -> Bson {
        Bson::Document(doc! {
            "clientSource": restriction.client_source,
            "serverAddress": restriction.server_address,
        })
    }
}

/// Minimal reply of createUser/updateUser/dropUser
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandOutput {
    /// Servers report `ok` as a double
    pub ok: f64,
}

impl CommandOutput {
    pub fn is_ok(&self) -> bool {
        self.ok == 1.0
    }
}

/// Reply of `usersInfo`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UsersInfo {
    pub ok: f64,
    #[serde(default)]
    pub users: Vec<UserDescriptor>,
}

impl UsersInfo {
    pub fn is_ok(&self) -> bool {
        self.ok == 1.0
    }

    pub fn find(&self, username: &str) -> Option<&UserDescriptor> {
        self.users.iter().find(|user| user.user == username)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserDescriptor {
    pub user: String,
    #[serde(default)]
    pub db: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleDocument>,
}

/// State reported back after `read`. The password is echoed from the
/// declaration, never from the server, and is not serialized.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ObservedUser {
    pub id: Identity,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl fmt::Debug for ObservedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &mask_secret(&self.password))
            .finish()
    }
}

/// Content of a user input file: one resource or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserFile {
    Many(Vec<UserSpec>),
    One(UserSpec),
}

impl UserFile {
    pub fn into_specs(self) -> Vec<UserSpec> {
        match self {
            UserFile::Many(specs) => specs,
            UserFile::One(spec) => vec![spec],
        }
    }
}
