//! Domain records: standard and admin audit events plus their enumerations.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Queue holding standard audit events.
pub const EVENTS_QUEUE_NAME: &str = "events";
/// Queue holding admin audit events.
pub const ADMIN_EVENTS_QUEUE_NAME: &str = "admin_events";

macro_rules! event_types {
    ($($variant:ident = $code:literal => $name:literal,)+) => {
        /// Kind of a standard audit event. Codes match the identity provider's numbering.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        #[repr(u8)]
        pub enum EventType {
            $($variant = $code,)+
        }

        impl EventType {
            pub const ALL: &'static [EventType] = &[$(EventType::$variant,)+];

            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(EventType::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(EventType::$variant => $name,)+
                }
            }
        }
    };
}

event_types! {
    Login = 1 => "LOGIN",
    LoginError = 2 => "LOGIN_ERROR",
    Register = 3 => "REGISTER",
    RegisterError = 4 => "REGISTER_ERROR",
    Logout = 5 => "LOGOUT",
    LogoutError = 6 => "LOGOUT_ERROR",
    CodeToToken = 7 => "CODE_TO_TOKEN",
    CodeToTokenError = 8 => "CODE_TO_TOKEN_ERROR",
    ClientLogin = 9 => "CLIENT_LOGIN",
    ClientLoginError = 10 => "CLIENT_LOGIN_ERROR",
    RefreshToken = 11 => "REFRESH_TOKEN",
    RefreshTokenError = 12 => "REFRESH_TOKEN_ERROR",
    IntrospectToken = 15 => "INTROSPECT_TOKEN",
    IntrospectTokenError = 16 => "INTROSPECT_TOKEN_ERROR",
    FederatedIdentityLink = 17 => "FEDERATED_IDENTITY_LINK",
    FederatedIdentityLinkError = 18 => "FEDERATED_IDENTITY_LINK_ERROR",
    RemoveFederatedIdentity = 19 => "REMOVE_FEDERATED_IDENTITY",
    RemoveFederatedIdentityError = 20 => "REMOVE_FEDERATED_IDENTITY_ERROR",
    UpdateEmail = 21 => "UPDATE_EMAIL",
    UpdateEmailError = 22 => "UPDATE_EMAIL_ERROR",
    UpdateProfile = 23 => "UPDATE_PROFILE",
    UpdateProfileError = 24 => "UPDATE_PROFILE_ERROR",
    VerifyEmail = 29 => "VERIFY_EMAIL",
    VerifyEmailError = 30 => "VERIFY_EMAIL_ERROR",
    VerifyProfile = 31 => "VERIFY_PROFILE",
    VerifyProfileError = 32 => "VERIFY_PROFILE_ERROR",
    GrantConsent = 35 => "GRANT_CONSENT",
    GrantConsentError = 36 => "GRANT_CONSENT_ERROR",
    UpdateConsent = 37 => "UPDATE_CONSENT",
    UpdateConsentError = 38 => "UPDATE_CONSENT_ERROR",
    RevokeGrant = 39 => "REVOKE_GRANT",
    RevokeGrantError = 40 => "REVOKE_GRANT_ERROR",
    SendVerifyEmail = 41 => "SEND_VERIFY_EMAIL",
    SendVerifyEmailError = 42 => "SEND_VERIFY_EMAIL_ERROR",
    SendResetPassword = 43 => "SEND_RESET_PASSWORD",
    SendResetPasswordError = 44 => "SEND_RESET_PASSWORD_ERROR",
    ResetPassword = 47 => "RESET_PASSWORD",
    ResetPasswordError = 48 => "RESET_PASSWORD_ERROR",
    RestartAuthentication = 49 => "RESTART_AUTHENTICATION",
    RestartAuthenticationError = 50 => "RESTART_AUTHENTICATION_ERROR",
    InvalidSignature = 51 => "INVALID_SIGNATURE",
    InvalidSignatureError = 52 => "INVALID_SIGNATURE_ERROR",
    RegisterNode = 53 => "REGISTER_NODE",
    RegisterNodeError = 54 => "REGISTER_NODE_ERROR",
    UnregisterNode = 55 => "UNREGISTER_NODE",
    UnregisterNodeError = 56 => "UNREGISTER_NODE_ERROR",
    UserInfoRequest = 57 => "USER_INFO_REQUEST",
    UserInfoRequestError = 58 => "USER_INFO_REQUEST_ERROR",
    Impersonate = 71 => "IMPERSONATE",
    ImpersonateError = 72 => "IMPERSONATE_ERROR",
    ExecuteActions = 75 => "EXECUTE_ACTIONS",
    ExecuteActionsError = 76 => "EXECUTE_ACTIONS_ERROR",
    ExecuteActionToken = 77 => "EXECUTE_ACTION_TOKEN",
    ExecuteActionTokenError = 78 => "EXECUTE_ACTION_TOKEN_ERROR",
    ClientInfo = 79 => "CLIENT_INFO",
    ClientInfoError = 80 => "CLIENT_INFO_ERROR",
    ClientRegister = 81 => "CLIENT_REGISTER",
    ClientRegisterError = 82 => "CLIENT_REGISTER_ERROR",
    ClientUpdate = 83 => "CLIENT_UPDATE",
    ClientUpdateError = 84 => "CLIENT_UPDATE_ERROR",
    ClientDelete = 85 => "CLIENT_DELETE",
    ClientDeleteError = 86 => "CLIENT_DELETE_ERROR",
    TokenExchange = 89 => "TOKEN_EXCHANGE",
    TokenExchangeError = 90 => "TOKEN_EXCHANGE_ERROR",
    DeleteAccount = 101 => "DELETE_ACCOUNT",
    DeleteAccountError = 102 => "DELETE_ACCOUNT_ERROR",
    UserDisabledByPermanentLockout = 105 => "USER_DISABLED_BY_PERMANENT_LOCKOUT",
    UserDisabledByPermanentLockoutError = 106 => "USER_DISABLED_BY_PERMANENT_LOCKOUT_ERROR",
    UserDisabledByTemporaryLockout = 107 => "USER_DISABLED_BY_TEMPORARY_LOCKOUT",
    UserDisabledByTemporaryLockoutError = 108 => "USER_DISABLED_BY_TEMPORARY_LOCKOUT_ERROR",
    UpdateCredential = 113 => "UPDATE_CREDENTIAL",
    UpdateCredentialError = 114 => "UPDATE_CREDENTIAL_ERROR",
    RemoveCredential = 115 => "REMOVE_CREDENTIAL",
    RemoveCredentialError = 116 => "REMOVE_CREDENTIAL_ERROR",
}

impl EventType {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Case-insensitive lookup by name (`"LOGIN"`, `"login_error"`).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation performed by an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum OperationType {
    Create = 1,
    Update = 2,
    Delete = 3,
    Action = 4,
}

impl OperationType {
    pub const ALL: &'static [OperationType] = &[
        OperationType::Create,
        OperationType::Update,
        OperationType::Delete,
        OperationType::Action,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(OperationType::Create),
            2 => Some(OperationType::Update),
            3 => Some(OperationType::Delete),
            4 => Some(OperationType::Action),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Create => "CREATE",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
            OperationType::Action => "ACTION",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard (user-facing) audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    /// `None` when the producer sent no timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub realm_id: Uuid,
    #[serde(default)]
    pub realm_name: String,
    #[serde(default)]
    pub client_id: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub ip_address: String,
    /// Empty when the event is not an error.
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub details: HashMap<String, String>,
}

/// Who performed an admin operation. Ids the producer left empty stay nil.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthDetails {
    pub realm_id: Uuid,
    #[serde(default)]
    pub realm_name: String,
    pub client_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub ip_address: String,
}

/// Audit event emitted for an administrative operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAuditEvent {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    pub realm_id: Uuid,
    #[serde(default)]
    pub realm_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_details: Option<AuthDetails>,
    #[serde(default)]
    pub resource_type: String,
    pub operation_type: OperationType,
    #[serde(default)]
    pub resource_path: String,
    /// Usually a serialized representation of the changed resource.
    #[serde(default)]
    pub representation: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub details: HashMap<String, String>,
}

/// The two record kinds flowing through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Event,
    AdminEvent,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Event => "event",
            RecordKind::AdminEvent => "admin_event",
        }
    }

    /// Name of the durable queue holding records of this kind.
    pub fn queue_name(self) -> &'static str {
        match self {
            RecordKind::Event => EVENTS_QUEUE_NAME,
            RecordKind::AdminEvent => ADMIN_EVENTS_QUEUE_NAME,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::AuditEvent {}
    impl Sealed for super::AdminAuditEvent {}
}

/// A record the queue can carry. Implemented only by [`AuditEvent`] and [`AdminAuditEvent`].
pub trait Record:
    sealed::Sealed + Serialize + DeserializeOwned + fmt::Debug + Clone + Send + Sync + 'static
{
    const KIND: RecordKind;

    fn id(&self) -> Uuid;
}

impl Record for AuditEvent {
    const KIND: RecordKind = RecordKind::Event;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for AdminAuditEvent {
    const KIND: RecordKind = RecordKind::AdminEvent;

    fn id(&self) -> Uuid {
        self.id
    }
}
