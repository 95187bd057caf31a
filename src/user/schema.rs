use crate::config::{ENV_AUTH_DATABASE, ENV_AUTH_PASSWORD, ENV_AUTH_USERNAME, ENV_URL};
use serde::Serialize;

pub const RESOURCE_TYPE: &str = "mongodb_user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    StringSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub required: bool,
    /// A change to this attribute destroys and recreates the resource
    pub force_new: bool,
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_default: Option<&'static str>,
    pub description: &'static str,
}

impl AttributeSchema {
    fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: AttributeType::String,
            required: false,
            force_new: false,
            sensitive: false,
            env_default: None,
            description,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    fn env_default(mut self, key: &'static str) -> Self {
        self.env_default = Some(key);
        self
    }

    fn set(mut self) -> Self {
        self.kind = AttributeType::StringSet;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSchema {
    pub resource_type: &'static str,
    pub attributes: Vec<AttributeSchema>,
}

impl ResourceSchema {
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    pub fn forces_replacement(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(|attribute| attribute.force_new)
    }
}

/// Attributes of the provider block
pub fn provider_schema() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::string("url", "The MongoDB url.").env_default(ENV_URL),
        AttributeSchema::string("auth_database", "The MongoDB authentication database.")
            .env_default(ENV_AUTH_DATABASE),
        AttributeSchema::string("auth_username", "The MongoDB login username.")
            .env_default(ENV_AUTH_USERNAME),
        AttributeSchema::string("auth_password", "The MongoDB login password.")
            .env_default(ENV_AUTH_PASSWORD)
            .sensitive(),
    ]
}

pub fn user_resource_schema() -> ResourceSchema {
    ResourceSchema {
        resource_type: RESOURCE_TYPE,
        attributes: vec![
            AttributeSchema::string("database", "Database the user is created in.")
                .required()
                .force_new(),
            AttributeSchema::string("username", "Name of the user.")
                .required()
                .force_new(),
            AttributeSchema::string("password", "Password of the user.")
                .required()
                .sensitive(),
            AttributeSchema::string("roles", "Roles granted on the user's database.").set(),
            AttributeSchema::string(
                "authentication_restrictions",
                "JSON list of {clientSource, serverAddress} restrictions.",
            ),
        ],
    }
}
