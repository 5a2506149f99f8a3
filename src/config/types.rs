//! Persisted record types
//!
//! Every record stored in a host section is an explicit typed struct. Records
//! coming from untrusted input (the store file, an identity provider reply, an
//! SSH service reply) are checked with [`Record::validate`] before use, and again
//! after every update.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Record validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("{record}: bad value for {field}: {reason}")]
    InvalidField {
        record: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("{record}: {message}")]
    Decode {
        record: &'static str,
        message: String,
    },
}

/// A typed record stored under its tag inside a host section
pub trait Record: Serialize + DeserializeOwned {
    /// Key of the record inside a section
    const TAG: &'static str;

    /// Check field-level invariants
    fn validate(&self) -> Result<(), RecordError>;

    /// Decode and validate a record from an untyped JSON value
    fn from_value(value: serde_json::Value) -> Result<Self, RecordError> {
        let record: Self = serde_json::from_value(value).map_err(|e| RecordError::Decode {
            record: Self::TAG,
            message: e.to_string(),
        })?;
        record.validate()?;
        Ok(record)
    }
}

fn invalid(record: &'static str, field: &'static str, reason: impl Into<String>) -> RecordError {
    RecordError::InvalidField {
        record,
        field,
        reason: reason.into(),
    }
}

fn check_text(record: &'static str, field: &'static str, value: Option<&str>) -> Result<(), RecordError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(invalid(record, field, "must not be empty")),
        _ => Ok(()),
    }
}

fn check_names(record: &'static str, field: &'static str, names: Option<&[String]>) -> Result<(), RecordError> {
    for name in names.unwrap_or_default() {
        if name.trim().is_empty() {
            return Err(invalid(record, field, "entries must not be empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid(record, field, format!("entry {:?} contains whitespace", name)));
        }
    }
    Ok(())
}

// ============================================================================
// Token
// ============================================================================

/// Which of the two bearer tokens an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access token"),
            TokenKind::Refresh => write!(f, "refresh token"),
        }
    }
}

/// Lifecycle state of a stored token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token stored for this host
    Unauthorized,
    AccessOnly,
    RefreshOnly,
    Both,
    /// A record exists but both tokens have been discarded
    Exhausted,
}

/// OAuth token issued for one target host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_server: Option<String>,
    /// Epoch seconds of the authorization-code grant; never touched by refresh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_at: Option<i64>,
    /// Epoch seconds at which the access token expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Token {
    /// True when neither bearer token is present
    pub fn is_exhausted(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    pub fn state(&self) -> TokenState {
        match (&self.access_token, &self.refresh_token) {
            (Some(_), Some(_)) => TokenState::Both,
            (Some(_), None) => TokenState::AccessOnly,
            (None, Some(_)) => TokenState::RefreshOnly,
            (None, None) => TokenState::Exhausted,
        }
    }

    pub fn get(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::Access => self.access_token.as_deref(),
            TokenKind::Refresh => self.refresh_token.as_deref(),
        }
    }

    /// Drop one bearer token. Dropping the access token also drops its expiry.
    pub fn clear(&mut self, kind: TokenKind) {
        match kind {
            TokenKind::Access => {
                self.access_token = None;
                self.expires_at = None;
            }
            TokenKind::Refresh => self.refresh_token = None,
        }
    }
}

impl Record for Token {
    const TAG: &'static str = "Token";

    fn validate(&self) -> Result<(), RecordError> {
        check_text(Self::TAG, "scope", self.scope.as_deref())?;
        check_text(Self::TAG, "token_type", self.token_type.as_deref())?;
        check_text(Self::TAG, "access_token", self.access_token.as_deref())?;
        check_text(Self::TAG, "refresh_token", self.refresh_token.as_deref())?;
        check_text(Self::TAG, "resource_server", self.resource_server.as_deref())?;
        if let Some(at) = self.authorized_at {
            if at <= 0 {
                return Err(invalid(Self::TAG, "authorized_at", format!("{} is not a timestamp", at)));
            }
        }
        if let Some(at) = self.expires_at {
            if at <= 0 {
                return Err(invalid(Self::TAG, "expires_at", format!("{} is not a timestamp", at)));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Security policy published by an SSH service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Identity providers the service accepts; absent or empty means any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permitted_idps: Option<Vec<String>>,
    /// Minutes an authorization stays usable; absent or 0 means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_timeout: Option<i64>,
}

impl Policy {
    /// Positive timeout in minutes, if the policy sets one
    pub fn timeout_minutes(&self) -> Option<i64> {
        self.authentication_timeout.filter(|m| *m > 0)
    }

    /// Identity providers the user must choose from, if restricted
    pub fn required_idps(&self) -> Option<&[String]> {
        self.permitted_idps.as_deref().filter(|idps| !idps.is_empty())
    }
}

impl Record for Policy {
    const TAG: &'static str = "Policy";

    fn validate(&self) -> Result<(), RecordError> {
        if let Some(minutes) = self.authentication_timeout {
            if minutes < 0 {
                return Err(invalid(Self::TAG, "authentication_timeout", format!("{} is negative", minutes)));
            }
        }
        if let Some(idps) = &self.permitted_idps {
            if idps.iter().any(|idp| idp.trim().is_empty()) {
                return Err(invalid(Self::TAG, "permitted_idps", "entries must not be empty"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// AccountMap
// ============================================================================

/// Remote accounts the current identity may log in as
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permitted_accounts: Option<Vec<String>>,
}

impl AccountMap {
    pub fn accounts(&self) -> &[String] {
        self.permitted_accounts.as_deref().unwrap_or_default()
    }
}

impl Record for AccountMap {
    const TAG: &'static str = "AccountMap";

    fn validate(&self) -> Result<(), RecordError> {
        check_names(Self::TAG, "permitted_accounts", self.permitted_accounts.as_deref())
    }
}

// ============================================================================
// Credential
// ============================================================================

/// Client id/secret registered for this installation
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub client: String,
    pub secret: String,
}

// Keep the secret out of logs
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client", &self.client)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Record for Credential {
    const TAG: &'static str = "Credential";

    fn validate(&self) -> Result<(), RecordError> {
        check_text(Self::TAG, "client", Some(&self.client))?;
        check_text(Self::TAG, "secret", Some(&self.secret))
    }
}
