//! Identity provider client
//!
//! Thin HTTP glue for the token endpoints. Every call except client
//! registration authenticates with the installation credential, which is
//! registered on first use and cached for the rest of the process.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::json;
use tracing::{debug, info};

use super::credential::CredentialStore;
use super::types::{
    AuthError, ClientRegistration, IdentityList, TokenGrant, ValidateResponse,
};
use crate::config::{ClientConfig, ConfigStore, Credential, Record};
use crate::token::TokenAuthority;

pub struct OAuthClient {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: CredentialStore,
    cached: Mutex<Option<Credential>>,
}

impl OAuthClient {
    pub fn new(config: ClientConfig, store: ConfigStore) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            credentials: CredentialStore::new(store),
            cached: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.auth_base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AuthError> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Register a new client for this installation
    pub async fn register_client(&self) -> Result<Credential, AuthError> {
        let body = json!({
            "client": {
                "template_id": self.config.template_id,
                "name": CredentialStore::client_name(),
            }
        });
        let resp = self
            .send(self.http.post(self.url("/v2/api/clients")).json(&body))
            .await?;
        let registration: ClientRegistration = resp.json().await?;
        let credential = registration.included.client_credential;
        credential.validate()?;
        info!("Registered client {}", credential.client);
        Ok(credential)
    }

    /// Stored credential, registering and persisting one on first use
    pub async fn credential(&self) -> Result<Credential, AuthError> {
        if let Some(cred) = self.cached.lock().clone() {
            return Ok(cred);
        }

        let cred = match self.credentials.load().await? {
            Some(cred) => cred,
            None => {
                let cred = self.register_client().await?;
                self.credentials.save(&cred).await?;
                cred
            }
        };
        *self.cached.lock() = Some(cred.clone());
        Ok(cred)
    }

    async fn authenticated(&self, method: Method, path: &str) -> Result<RequestBuilder, AuthError> {
        let cred = self.credential().await?;
        Ok(self
            .http
            .request(method, self.url(path))
            .basic_auth(&cred.client, Some(&cred.secret)))
    }

    /// Ask the provider whether `token` is active
    pub async fn is_token_valid(&self, token: &str) -> Result<bool, AuthError> {
        let request = self
            .authenticated(Method::POST, "/v2/oauth2/token/validate")
            .await?
            .form(&[("token", token)]);
        let reply: ValidateResponse = self.send(request).await?.json().await?;
        debug!("Token validation: active={}", reply.active);
        Ok(reply.active)
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let request = self
            .authenticated(Method::POST, "/v2/oauth2/token")
            .await?
            .form(&[("refresh_token", refresh_token), ("grant_type", "refresh_token")]);
        Ok(self.send(request).await?.json().await?)
    }

    pub async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        let request = self
            .authenticated(Method::POST, "/v2/oauth2/token/revoke")
            .await?
            .form(&[("token", token)]);
        self.send(request).await?;
        Ok(())
    }

    /// Resolve a username (e.g. `alice@example.org`) to its identity id
    pub async fn lookup_identity(&self, username: &str) -> Result<String, AuthError> {
        let request = self
            .authenticated(Method::GET, "/v2/api/identities")
            .await?
            .query(&[("usernames", username)]);
        let list: IdentityList = self.send(request).await?.json().await?;
        list.identities
            .into_iter()
            .next()
            .map(|identity| identity.id)
            .ok_or_else(|| AuthError::IdentityNotFound(username.to_string()))
    }

    /// Redeem an authorization code
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenGrant, AuthError> {
        let redirect_uri = self.config.redirect_uri();
        let request = self
            .authenticated(Method::POST, "/v2/oauth2/token")
            .await?
            .form(&[
                ("code", code),
                ("code_verifier", code_verifier),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ]);
        Ok(self.send(request).await?.json().await?)
    }
}

#[async_trait]
impl TokenAuthority for OAuthClient {
    async fn is_token_valid(&self, token: &str) -> Result<bool, AuthError> {
        OAuthClient::is_token_valid(self, token).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        OAuthClient::refresh_token(self, refresh_token).await
    }

    async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        OAuthClient::revoke_token(self, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Form, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct Hits {
        register: AtomicUsize,
        validate: AtomicUsize,
    }

    /// Start a mock HTTP server and return its base URL.
    async fn start_mock(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn has_basic_auth(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("Basic "))
            .unwrap_or(false)
    }

    fn mock_provider(hits: Arc<Hits>) -> Router {
        Router::new()
            .route(
                "/v2/api/clients",
                post(|State(hits): State<Arc<Hits>>| async move {
                    hits.register.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({
                        "included": {"client_credential": {
                            "client": "registered-id",
                            "secret": "registered-secret",
                            "name": "OAuth SSH Client"
                        }}
                    }))
                }),
            )
            .route(
                "/v2/oauth2/token/validate",
                post(
                    |State(hits): State<Arc<Hits>>,
                     headers: HeaderMap,
                     Form(form): Form<HashMap<String, String>>| async move {
                        hits.validate.fetch_add(1, Ordering::SeqCst);
                        if !has_basic_auth(&headers) {
                            return Err(StatusCode::UNAUTHORIZED);
                        }
                        let active = form.get("token").map(|t| t == "good").unwrap_or(false);
                        Ok(Json(serde_json::json!({ "active": active })))
                    },
                ),
            )
            .route(
                "/v2/oauth2/token",
                post(|Form(form): Form<HashMap<String, String>>| async move {
                    match form.get("grant_type").map(String::as_str) {
                        Some("refresh_token") => Ok(Json(serde_json::json!({
                            "access_token": "new-access",
                            "expires_in": 3600,
                            "token_type": "Bearer"
                        }))),
                        Some("authorization_code") if form.contains_key("code_verifier") => {
                            Ok(Json(serde_json::json!({
                                "access_token": "granted-access",
                                "refresh_token": "granted-refresh",
                                "expires_in": 3600
                            })))
                        }
                        _ => Err(StatusCode::BAD_REQUEST),
                    }
                }),
            )
            .route(
                "/v2/oauth2/token/revoke",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route(
                "/v2/api/identities",
                get(|Query(query): Query<HashMap<String, String>>| async move {
                    let identities = match query.get("usernames").map(String::as_str) {
                        Some("alice@example.org") => serde_json::json!([{"id": "alice-id"}]),
                        _ => serde_json::json!([]),
                    };
                    Json(serde_json::json!({ "identities": identities }))
                }),
            )
            .with_state(hits)
    }

    async fn client_for(base: String) -> (OAuthClient, ConfigStore, TempDir) {
        let temp = tempdir().unwrap();
        let mut config = ClientConfig::for_environment(Environment::Production, temp.path());
        config.auth_base_url = base;
        let store = ConfigStore::with_path(config.store_path.clone());
        let client = OAuthClient::new(config, store.clone()).unwrap();
        (client, store, temp)
    }

    #[tokio::test]
    async fn test_registers_once_and_persists_credential() {
        let hits = Arc::new(Hits::default());
        let base = start_mock(mock_provider(hits.clone())).await;
        let (client, store, _temp) = client_for(base).await;

        assert!(client.is_token_valid("good").await.unwrap());
        assert!(!client.is_token_valid("bad").await.unwrap());
        assert_eq!(hits.register.load(Ordering::SeqCst), 1);
        assert_eq!(hits.validate.load(Ordering::SeqCst), 2);

        let saved = CredentialStore::new(store).load().await.unwrap().unwrap();
        assert_eq!(saved.client, "registered-id");
    }

    #[tokio::test]
    async fn test_reuses_stored_credential() {
        let hits = Arc::new(Hits::default());
        let base = start_mock(mock_provider(hits.clone())).await;
        let (client, store, _temp) = client_for(base).await;

        CredentialStore::new(store)
            .save(&Credential {
                client: "existing".into(),
                secret: "secret".into(),
            })
            .await
            .unwrap();

        assert_eq!(client.credential().await.unwrap().client, "existing");
        assert!(client.is_token_valid("good").await.unwrap());
        assert_eq!(hits.register.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_and_code_exchange() {
        let hits = Arc::new(Hits::default());
        let base = start_mock(mock_provider(hits)).await;
        let (client, _store, _temp) = client_for(base).await;

        let grant = client.refresh_token("RT").await.unwrap();
        assert_eq!(grant.access_token.as_deref(), Some("new-access"));
        assert_eq!(grant.refresh_token, None);

        let grant = client.exchange_code("code", "verifier").await.unwrap();
        assert_eq!(grant.refresh_token.as_deref(), Some("granted-refresh"));
    }

    #[tokio::test]
    async fn test_revoke_surfaces_status_error() {
        let hits = Arc::new(Hits::default());
        let base = start_mock(mock_provider(hits)).await;
        let (client, _store, _temp) = client_for(base).await;

        let err = client.revoke_token("AT").await.unwrap_err();
        assert!(matches!(err, AuthError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_identity_lookup() {
        let hits = Arc::new(Hits::default());
        let base = start_mock(mock_provider(hits)).await;
        let (client, _store, _temp) = client_for(base).await;

        assert_eq!(
            client.lookup_identity("alice@example.org").await.unwrap(),
            "alice-id"
        );
        let err = client.lookup_identity("nobody@example.org").await.unwrap_err();
        assert!(matches!(err, AuthError::IdentityNotFound(_)));
    }
}
