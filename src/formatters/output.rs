use crate::shared::security::mask_secret;
use crate::user::batch::{ApplyAction, BatchResult};
use crate::user::model::{Identity, ObservedUser, UsersInfo};
use crate::user::schema::{AttributeSchema, ResourceSchema};
use serde_json::{json, Value};

/// Renders operation results as JSON for the command line
pub struct OutputFormatter;

impl OutputFormatter {
    /// Summary counts plus one entry per resource, in input order
    pub fn format_batch_results(operation: &str, results: &[BatchResult]) -> Value {
        let count = |action: ApplyAction| {
            results
                .iter()
                .filter(|r| matches!(&r.result, Ok(outcome) if outcome.action == action))
                .count()
        };
        let failed = results.iter().filter(|r| !r.is_ok()).count();

        json!({
            "summary": {
                "operation": operation,
                "total": results.len(),
                "created": count(ApplyAction::Created),
                "updated": count(ApplyAction::Updated),
                "deleted": count(ApplyAction::Deleted),
                "failed": failed,
            },
            "resources": results.iter().map(|r| match &r.result {
                Ok(outcome) => json!({
                    "id": outcome.identity,
                    "action": outcome.action,
                }),
                Err(e) => json!({
                    "id": r.identity,
                    "error": e.to_string(),
                }),
            }).collect::<Vec<_>>(),
        })
    }

    /// Result of a single lifecycle operation on one resource
    pub fn format_operation(
        operation: &str,
        identity: &Identity,
        result: Result<Value, String>,
    ) -> Value {
        match result {
            Ok(details) => json!({
                "id": identity,
                "operation": operation,
                "success": true,
                "details": details,
            }),
            Err(error) => Self::format_error(operation, identity, &error),
        }
    }

    pub fn format_error(operation: &str, identity: &Identity, error: &str) -> Value {
        let (database, username) = identity.parts();
        json!({
            "id": identity,
            "operation": operation,
            "success": false,
            "error": {
                "message": error,
                "database": database,
                "username": username,
            }
        })
    }

    /// Observed state with the password masked
    pub fn format_observed(observed: &ObservedUser) -> Value {
        json!({
            "id": observed.id,
            "username": observed.username,
            "password": mask_secret(&observed.password),
        })
    }

    pub fn format_users_info(identity: &Identity, info: &UsersInfo) -> Value {
        json!({
            "id": identity,
            "user_count": info.users.len(),
            "users": info.users.iter().map(|user| json!({
                "user": user.user,
                "db": user.db,
                "roles": user.roles.iter().map(|r| json!({"role": r.role, "db": r.db})).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        })
    }

    pub fn format_schema(provider: &[AttributeSchema], resources: &[ResourceSchema]) -> Value {
        let mut resource_map = serde_json::Map::new();
        for resource in resources {
            resource_map.insert(
                resource.resource_type.to_string(),
                json!({ "attributes": resource.attributes }),
            );
        }

        json!({
            "provider": { "attributes": provider },
            "resources": resource_map,
        })
    }
}
