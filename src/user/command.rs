use crate::user::model::{RestrictionDocument, RoleDocument};
use mongodb::bson::{Bson, Document};
use std::fmt;

/// User-administration commands issued by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminCommand {
    CreateUser,
    UpdateUser,
    DropUser,
    UsersInfo,
}

impl AdminCommand {
    /// Wire name, which is also the first key of the command document
    pub fn name(&self) -> &'static str {
        match self {
            AdminCommand::CreateUser => "createUser",
            AdminCommand::UpdateUser => "updateUser",
            AdminCommand::DropUser => "dropUser",
            AdminCommand::UsersInfo => "usersInfo",
        }
    }

    /// Recover the command from a document's first key
    pub fn of(command: &Document) -> Option<Self> {
        match command.keys().next().map(String::as_str) {
            Some("createUser") => Some(AdminCommand::CreateUser),
            Some("updateUser") => Some(AdminCommand::UpdateUser),
            Some("dropUser") => Some(AdminCommand::DropUser),
            Some("usersInfo") => Some(AdminCommand::UsersInfo),
            _ => None,
        }
    }
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `{createUser: <username>, pwd, roles, authenticationRestrictions}`
pub fn create_user(
    username: &str,
    password: &str,
    roles: &[RoleDocument],
    restrictions: &[RestrictionDocument],
) -> Document {
    user_document(
        AdminCommand::CreateUser,
        username,
        password,
        roles,
        restrictions,
    )
}

/// Same shape as [`create_user`]; the whole user document is rewritten
pub fn update_user(
    username: &str,
    password: &str,
    roles: &[RoleDocument],
    restrictions: &[RestrictionDocument],
) -> Document {
    user_document(
        AdminCommand::UpdateUser,
        username,
        password,
        roles,
        restrictions,
    )
}

pub fn drop_user(username: &str) -> Document {
    let mut command = Document::new();
    command.insert(AdminCommand::DropUser.name(), username);
    command
}

pub fn users_info(username: &str) -> Document {
    let mut command = Document::new();
    command.insert(AdminCommand::UsersInfo.name(), username);
    command
}

fn user_document(
    kind: AdminCommand,
    username: &str,
    password: &str,
    roles: &[RoleDocument],
    restrictions: &[RestrictionDocument],
) -> Document {
    let mut command = Document::new();
    command.insert(kind.name(), username);
    command.insert("pwd", password);
    command.insert(
        "roles",
        Bson::Array(roles.iter().cloned().map(Bson::from).collect()),
    );
    // always present, possibly empty
    command.insert(
        "authenticationRestrictions",
        Bson::Array(restrictions.iter().cloned().map(Bson::from).collect()),
    );
    command
}
