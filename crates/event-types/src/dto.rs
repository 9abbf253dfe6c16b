//! Wire DTOs accepted by the ingestion API.
//!
//! Ids arrive as strings and the type codes as either numbers or names, so every field here is
//! raw; translation into domain records happens in the API crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Enumeration code on the wire: the numeric code or the variant name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeCode {
    Code(i64),
    Name(String),
}

impl Default for TypeCode {
    /// Code 0 is "unspecified" and never maps to a known type.
    fn default() -> Self {
        TypeCode::Code(0)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeCode::Code(c) => write!(f, "{c}"),
            TypeCode::Name(n) => write!(f, "{n:?}"),
        }
    }
}

/// Create request for a standard audit event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEventRequest {
    #[serde(default)]
    pub id: String,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(rename = "type", default)]
    pub event_type: TypeCode,
    #[serde(default)]
    pub realm_id: String,
    #[serde(default)]
    pub realm_name: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub details: Option<HashMap<String, String>>,
}

/// Auth block of an admin create request; every id may be left empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthDetailsRequest {
    #[serde(default)]
    pub realm_id: String,
    #[serde(default)]
    pub realm_name: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub ip_address: String,
}

/// Create request for an admin audit event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAdminEventRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub realm_id: String,
    #[serde(default)]
    pub realm_name: String,
    #[serde(default)]
    pub auth_details: Option<AuthDetailsRequest>,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub operation_type: TypeCode,
    #[serde(default)]
    pub resource_path: String,
    #[serde(default)]
    pub representation: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub details: Option<HashMap<String, String>>,
}

/// Empty success body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateResponse {}

/// Error body returned with a non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}
