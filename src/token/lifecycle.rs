//! Token lifecycle
//!
//! Decides whether the cached token for a host is still usable:
//!
//! ```text
//!   Both ──access invalid──▶ RefreshOnly ──refresh invalid──▶ Exhausted
//!    │                          │
//!    └─access valid─▶ use       └─refresh valid─▶ refresh, use
//! ```
//!
//! A positive policy timeout is counted from the original authorization and is
//! checked before either token is queried.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, Policy, Record, StorageError, Token, TokenKind, TokenState};
use crate::oauth::{AuthError, TokenGrant};

/// Remote side of the token lifecycle
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    async fn is_token_valid(&self, token: &str) -> Result<bool, AuthError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;
    async fn revoke_token(&self, token: &str) -> Result<(), AuthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{reason} Use `oauth-ssh token authorize {host}`.")]
    NeedsAuthorization { host: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

fn needs_authorization(host: &str, reason: impl Into<String>) -> TokenError {
    TokenError::NeedsAuthorization {
        host: host.to_string(),
        reason: reason.into(),
    }
}

/// Owns the cached token and policy of each host
pub struct TokenManager {
    store: ConfigStore,
    authority: Arc<dyn TokenAuthority>,
}

/// Whether `minutes` have passed since `authorized_at`.
///
/// A window too long to express in seconds never closes; a token without an
/// authorization time is always expired.
fn authorization_expired(now: i64, authorized_at: Option<i64>, minutes: i64) -> bool {
    let Some(at) = authorized_at else {
        return true;
    };
    match minutes.checked_mul(60) {
        Some(window) => now.saturating_sub(at) > window,
        None => false,
    }
}

impl TokenManager {
    pub fn new(store: ConfigStore, authority: Arc<dyn TokenAuthority>) -> Self {
        Self { store, authority }
    }

    /// Return a bearer token accepted by the identity provider, refreshing if
    /// needed, or fail with `NeedsAuthorization`.
    pub async fn find_access_token(&self, host: &str) -> Result<String, TokenError> {
        let mut token: Token = self
            .store
            .load_record(host)
            .await?
            .ok_or_else(|| needs_authorization(host, "No token found."))?;
        let policy: Policy = self
            .store
            .load_record(host)
            .await?
            .ok_or_else(|| needs_authorization(host, "No policy found."))?;

        if let Some(minutes) = policy.timeout_minutes() {
            let now = chrono::Utc::now().timestamp();
            if authorization_expired(now, token.authorized_at, minutes) {
                info!("Authorization for {} is older than {} minutes", host, minutes);
                return Err(needs_authorization(
                    host,
                    format!(
                        "Authentication has timed out. This host allows {} minutes from \
                         the original authorization; refreshing the token does not extend it.",
                        minutes
                    ),
                ));
            }
        }

        let mut stale_access = None;
        if let Some(access) = token.access_token.clone() {
            if self.authority.is_token_valid(&access).await? {
                debug!("Access token for {} is valid", host);
                return Ok(access);
            }
            debug!("Access token for {} is no longer valid", host);
            token.clear(TokenKind::Access);
            self.store.save_record(host, &token).await?;
            stale_access = Some(access);
        }

        if let Some(refresh) = token.refresh_token.clone() {
            if self.authority.is_token_valid(&refresh).await? {
                let grant = self.authority.refresh_token(&refresh).await?;
                grant.merge_into(&mut token, chrono::Utc::now().timestamp());
                token.validate().map_err(StorageError::from)?;
                self.store.save_record(host, &token).await?;
                info!("Refreshed access token for {}", host);

                if let Some(old) = stale_access {
                    if let Err(e) = self.authority.revoke_token(&old).await {
                        warn!("Revoking the previous access token for {} failed (ignored): {}", host, e);
                    }
                }

                return token
                    .access_token
                    .ok_or_else(|| needs_authorization(host, "Refresh returned no access token."));
            }
            debug!("Refresh token for {} is no longer valid", host);
            token.clear(TokenKind::Refresh);
            self.store.save_record(host, &token).await?;
        }

        Err(needs_authorization(host, "No valid token found."))
    }

    /// Best-effort remote revoke, then unconditional local removal
    pub async fn revoke(&self, host: &str, kind: TokenKind) -> Result<(), TokenError> {
        let Some(mut token) = self.store.load_record::<Token>(host).await? else {
            return Ok(());
        };
        let Some(value) = token.get(kind).map(str::to_string) else {
            return Ok(());
        };

        if let Err(e) = self.authority.revoke_token(&value).await {
            warn!("Revoking the {} for {} failed (ignored): {}", kind, host, e);
        }
        token.clear(kind);
        self.store.save_record(host, &token).await?;
        info!("Removed {} for {}", kind, host);
        Ok(())
    }

    /// Persist a freshly granted token
    pub async fn save_token(&self, host: &str, token: &Token) -> Result<(), TokenError> {
        self.store.save_record(host, token).await?;
        Ok(())
    }

    /// Lifecycle state of the stored token, without any network call
    pub async fn state(&self, host: &str) -> Result<TokenState, TokenError> {
        Ok(self
            .store
            .load_record::<Token>(host)
            .await?
            .map(|t| t.state())
            .unwrap_or(TokenState::Unauthorized))
    }
}
