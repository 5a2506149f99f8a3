use serde::Deserialize;

use crate::config::{Credential, RecordError, StorageError, Token};

/// Identity provider errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected identity provider response: {0}")]
    Response(String),

    #[error("No identity found for {0}")]
    IdentityNotFound(String),

    #[error("Invalid authorization URL: {0}")]
    InvalidUrl(String),

    #[error("No authorization code entered")]
    MissingCode,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    InvalidRecord(#[from] RecordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Token endpoint reply (authorization-code exchange or refresh)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenGrant {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub resource_server: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    /// A fresh token from an authorization-code grant completed at `authorized_at`
    pub fn into_token(self, authorized_at: i64) -> Token {
        let mut token = Token {
            authorized_at: Some(authorized_at),
            ..Default::default()
        };
        self.merge_into(&mut token, authorized_at);
        token
    }

    /// Apply a refresh reply. Fields the reply carries replace the stored ones;
    /// `authorized_at` is never touched.
    pub fn merge_into(self, token: &mut Token, now: i64) {
        if let Some(v) = self.access_token {
            token.access_token = Some(v);
            token.expires_at = self.expires_in.map(|secs| now + secs);
        }
        if let Some(v) = self.refresh_token {
            token.refresh_token = Some(v);
        }
        if let Some(v) = self.resource_server {
            token.resource_server = Some(v);
        }
        if let Some(v) = self.token_type {
            token.token_type = Some(v);
        }
        if let Some(v) = self.scope {
            token.scope = Some(v);
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidateResponse {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClientRegistration {
    pub included: IncludedCredential,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IncludedCredential {
    pub client_credential: Credential,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdentityList {
    #[serde(default)]
    pub identities: Vec<Identity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Identity {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_deserializes_provider_reply() {
        let json = r#"{
            "access_token": "AT",
            "expires_in": 172800,
            "resource_server": "30efa54d-081a-4098-8d02-325d6525dab2",
            "token_type": "Bearer",
            "other_tokens": [],
            "scope": "https://auth.globus.org/scopes/ssh.example.org/ssh",
            "refresh_token": "RT"
        }"#;
        let grant: TokenGrant = serde_json::from_str(json).unwrap();
        let token = grant.into_token(1_000);
        assert_eq!(token.access_token.as_deref(), Some("AT"));
        assert_eq!(token.refresh_token.as_deref(), Some("RT"));
        assert_eq!(token.authorized_at, Some(1_000));
        assert_eq!(token.expires_at, Some(1_000 + 172_800));
    }

    #[test]
    fn test_refresh_keeps_authorized_at_and_missing_fields() {
        let mut token = Token {
            access_token: None,
            refresh_token: Some("RT".into()),
            authorized_at: Some(500),
            scope: Some("scope".into()),
            ..Default::default()
        };
        TokenGrant {
            access_token: Some("AT2".into()),
            expires_in: Some(60),
            ..Default::default()
        }
        .merge_into(&mut token, 2_000);

        assert_eq!(token.access_token.as_deref(), Some("AT2"));
        assert_eq!(token.expires_at, Some(2_060));
        assert_eq!(token.refresh_token.as_deref(), Some("RT"));
        assert_eq!(token.scope.as_deref(), Some("scope"));
        assert_eq!(token.authorized_at, Some(500));
    }
}
