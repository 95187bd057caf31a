// Re-export modules for testing and external use
pub mod connection {
    pub mod client;
    pub mod handle;

    pub use client::{ConnectionError, MongoConnection};
    pub use handle::{AdminCommandRunner, DriverError};
}

pub mod user {
    pub mod batch;
    pub mod command;
    pub mod model;
    pub mod reconciler;
    pub mod schema;
    pub mod translate;

    // Re-export commonly used items
    pub use batch::{ApplyAction, ApplyOutcome, BatchReconciler, BatchResult};
    pub use command::AdminCommand;
    pub use model::{Identity, ObservedUser, RestrictionDocument, RoleDocument, UserSpec, UsersInfo};
    pub use reconciler::{
        read, CommandFailure, LookupError, ReconcileError, UserError, UserReconciler,
    };
    pub use translate::{translate_auth_restrictions, translate_roles, RestrictionParseError};
}

pub mod formatters {
    pub mod output;

    pub use output::OutputFormatter;
}

pub mod shared {
    pub mod logging;
    pub mod security;
}

pub mod core {
    pub mod provider;
}

pub mod config;

// Re-export commonly used types for easier testing and external use
pub use crate::core::provider::{TfMongo, TfMongoError};
pub use connection::{AdminCommandRunner, MongoConnection};
pub use user::{UserReconciler, UserSpec};
