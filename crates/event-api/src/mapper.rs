//! Wire request → domain record. Nothing reaches the queue unless it maps cleanly.

use chrono::{DateTime, Utc};
use event_types::{
    AdminAuditEvent, AuditEvent, AuthDetails, AuthDetailsRequest, CreateAdminEventRequest,
    CreateEventRequest, EventType, OperationType, TypeCode,
};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid {field}: {source}")]
    InvalidId {
        field: &'static str,
        #[source]
        source: uuid::Error,
    },
    #[error("invalid time: {0}")]
    InvalidTime(#[source] chrono::ParseError),
    #[error("invalid event type: {0}")]
    InvalidEventType(TypeCode),
    #[error("invalid operation type: {0}")]
    InvalidOperationType(TypeCode),
}

pub fn map_create_event(req: CreateEventRequest) -> Result<AuditEvent, MapError> {
    Ok(AuditEvent {
        id: required_id("id", &req.id)?,
        time: parse_time(req.time.as_deref())?,
        realm_id: required_id("realm id", &req.realm_id)?,
        user_id: required_id("user id", &req.user_id)?,
        event_type: event_type(&req.event_type)?,
        realm_name: req.realm_name,
        client_id: req.client_id,
        session_id: req.session_id,
        ip_address: req.ip_address,
        error: req.error,
        details: req.details.unwrap_or_default(),
    })
}

pub fn map_create_admin_event(req: CreateAdminEventRequest) -> Result<AdminAuditEvent, MapError> {
    Ok(AdminAuditEvent {
        id: required_id("id", &req.id)?,
        time: parse_time(req.time.as_deref())?,
        realm_id: required_id("realm id", &req.realm_id)?,
        auth_details: req.auth_details.map(auth_details).transpose()?,
        operation_type: operation_type(&req.operation_type)?,
        realm_name: req.realm_name,
        resource_type: req.resource_type,
        resource_path: req.resource_path,
        representation: req.representation,
        error: req.error,
        details: req.details.unwrap_or_default(),
    })
}

fn auth_details(req: AuthDetailsRequest) -> Result<AuthDetails, MapError> {
    Ok(AuthDetails {
        realm_id: optional_id("auth details realm id", &req.realm_id)?,
        client_id: optional_id("auth details client id", &req.client_id)?,
        user_id: optional_id("auth details user id", &req.user_id)?,
        realm_name: req.realm_name,
        ip_address: req.ip_address,
    })
}

fn required_id(field: &'static str, raw: &str) -> Result<Uuid, MapError> {
    Uuid::parse_str(raw).map_err(|source| MapError::InvalidId { field, source })
}

/// Empty means "not supplied" and maps to the nil UUID.
fn optional_id(field: &'static str, raw: &str) -> Result<Uuid, MapError> {
    if raw.is_empty() {
        return Ok(Uuid::nil());
    }
    required_id(field, raw)
}

fn parse_time(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, MapError> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(MapError::InvalidTime),
    }
}

fn event_type(code: &TypeCode) -> Result<EventType, MapError> {
    let found = match code {
        TypeCode::Code(c) => u8::try_from(*c).ok().and_then(EventType::from_code),
        TypeCode::Name(name) => EventType::from_name(name),
    };
    found.ok_or_else(|| MapError::InvalidEventType(code.clone()))
}

fn operation_type(code: &TypeCode) -> Result<OperationType, MapError> {
    let found = match code {
        TypeCode::Code(c) => u8::try_from(*c).ok().and_then(OperationType::from_code),
        TypeCode::Name(name) => OperationType::from_name(name),
    };
    found.ok_or_else(|| MapError::InvalidOperationType(code.clone()))
}
