//! Normalisation of the SleepHQ response bodies.
//!
//! The service answers with several JSON shapes for the same resource. Each
//! shape is recognised explicitly; anything else is a protocol error rather
//! than an empty result.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::{SyncError, SyncResult};
use crate::config::DEFAULT_TOKEN_LIFETIME_SECS;
use crate::error::SyncOperation;

/// Body of a successful `POST /oauth/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds; the service may send an integer or a float
    #[serde(default)]
    pub expires_in: Option<f64>,
}

impl TokenResponse {
    /// Absent, null or non-positive lifetimes fall back to the default.
    pub fn lifetime_secs(&self) -> f64 {
        match self.expires_in {
            Some(secs) if secs.is_finite() && secs > 0.0 => secs,
            _ => DEFAULT_TOKEN_LIFETIME_SECS as f64,
        }
    }
}

/// The recognised shapes of the teams listing.
#[derive(Debug, Clone, PartialEq)]
pub enum TeamsShape {
    /// `[ {...}, ... ]`
    Bare(Vec<Value>),
    /// `{ "data": [ ... ] }`
    Data(Vec<Value>),
    /// `{ "teams": [ ... ] }`
    Teams(Vec<Value>),
}

impl TeamsShape {
    pub fn parse(body: &Value) -> SyncResult<Self> {
        match body {
            Value::Array(items) => Ok(TeamsShape::Bare(items.clone())),
            Value::Object(object) => {
                let data = object.get("data").and_then(Value::as_array);
                let teams = object.get("teams").and_then(Value::as_array);
                match (data, teams) {
                    (Some(items), _) if !items.is_empty() => Ok(TeamsShape::Data(items.clone())),
                    (_, Some(items)) => Ok(TeamsShape::Teams(items.clone())),
                    (Some(items), None) => Ok(TeamsShape::Data(items.clone())),
                    (None, None) => Err(SyncError::unexpected_shape(
                        SyncOperation::TeamResolution,
                        "teams response has neither a `data` nor a `teams` list",
                    )),
                }
            }
            other => Err(SyncError::unexpected_shape(
                SyncOperation::TeamResolution,
                format!("unexpected teams response type: {}", json_type(other)),
            )),
        }
    }

    pub fn into_teams(self) -> Vec<Value> {
        match self {
            TeamsShape::Bare(items) | TeamsShape::Data(items) | TeamsShape::Teams(items) => items,
        }
    }
}

/// Resolve the primary team id from a teams listing body.
pub fn first_team_id(body: &Value) -> SyncResult<String> {
    let teams = TeamsShape::parse(body)?.into_teams();
    let first = teams.first().ok_or_else(|| {
        SyncError::unexpected_shape(SyncOperation::TeamResolution, "no teams returned")
    })?;

    let team = first.as_object().ok_or_else(|| {
        SyncError::unexpected_shape(
            SyncOperation::TeamResolution,
            format!("team entry is a {}, not an object", json_type(first)),
        )
    })?;

    id_field(team, &["id", "team_id"]).ok_or_else(|| {
        SyncError::unexpected_shape(
            SyncOperation::TeamResolution,
            "team has neither an `id` nor a `team_id` field",
        )
    })
}

/// Resolve the import id from a create-import body (`data`-wrapped or bare).
pub fn import_id(body: &Value) -> SyncResult<String> {
    let object = body.as_object().ok_or_else(|| {
        SyncError::unexpected_shape(
            SyncOperation::CreateImport,
            format!("unexpected import response type: {}", json_type(body)),
        )
    })?;

    let import = match object.get("data") {
        Some(Value::Object(inner)) => inner,
        _ => object,
    };

    id_field(import, &["id", "import_id"]).ok_or_else(|| {
        SyncError::unexpected_shape(
            SyncOperation::CreateImport,
            "created import but no `id` or `import_id` in response",
        )
    })
}

/// First present, non-empty identifier among `keys`. Numbers are stringified.
pub fn id_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(id_to_string)
}

pub fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
