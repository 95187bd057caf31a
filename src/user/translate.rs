//! Conversion of declared roles and authentication restrictions into the
//! nested documents MongoDB's user-administration commands expect.

use crate::shared::security::snippet;
use crate::user::model::{RestrictionDocument, RoleDocument};
use std::collections::BTreeSet;
use thiserror::Error;

const SNIPPET_CHARS: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RestrictionParseError {
    #[error("Unable to parse `authentication_restrictions` JSON: {reason} - Content: {content}")]
    InvalidJson { reason: String, content: String },
}

/// One `{role, db}` document per declared role, all scoped to `database`.
/// Output follows the set's lexical order.
pub fn translate_roles(roles: &BTreeSet<String>, database: &str) -> Vec<RoleDocument> {
    roles
        .iter()
        .map(|role| RoleDocument {
            role: role.clone(),
            db: database.to_string(),
        })
        .collect()
}

/// Parse the optional restriction JSON. Absent, blank, and `null` input all
/// mean "no restrictions". Omitted `clientSource`/`serverAddress` fields
/// default to empty lists; entry order is preserved.
pub fn translate_auth_restrictions(
    raw: Option<&str>,
) -> Result<Vec<RestrictionDocument>, RestrictionParseError> {
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(Vec::new()),
    };

    serde_json::from_str::<Option<Vec<RestrictionDocument>>>(raw)
        .map(Option::unwrap_or_default)
        .map_err(|e| RestrictionParseError::InvalidJson {
            reason: e.to_string(),
            content: snippet(raw, SNIPPET_CHARS),
        })
}
