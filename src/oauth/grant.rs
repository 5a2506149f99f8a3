//! Interactive authorization-code grant (PKCE, out-of-band code entry)

use std::io::{BufRead, Write};

use tracing::info;

use super::client::OAuthClient;
use super::pkce::{generate_pkce_pair, PkcePair};
use super::types::AuthError;
use crate::config::{ClientConfig, Record, Token};

const SESSION_MESSAGE: &str = "The SSH service requires that you authenticate using this identity:";

/// URL the user visits plus the PKCE pair needed to redeem the code
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub pkce: PkcePair,
}

/// Build the authorize URL for `fqdn`'s SSH scope.
///
/// `force_login` asks the provider for a fresh login (used when the host's
/// policy limits how long an authorization lasts). `identity` pins the
/// identity the user must authenticate as.
pub fn authorization_request(
    config: &ClientConfig,
    client_id: &str,
    fqdn: &str,
    force_login: bool,
    identity: Option<&str>,
) -> Result<AuthorizationRequest, AuthError> {
    let pkce = generate_pkce_pair();
    let scope = config.scope_for(fqdn);
    let redirect_uri = config.redirect_uri();

    let mut params: Vec<(&str, &str)> = vec![
        ("redirect_uri", redirect_uri.as_str()),
        ("client_id", client_id),
        ("access_type", "offline"),
        ("state", "_default"),
        ("code_challenge", pkce.code_challenge.as_str()),
        ("code_challenge_method", "S256"),
        ("response_type", "code"),
        ("scope", scope.as_str()),
    ];
    if let Some(identity) = identity {
        params.push(("session_message", SESSION_MESSAGE));
        params.push(("session_required_identities", identity));
    }
    if force_login {
        params.push(("prompt", "login"));
    }

    let base = format!("{}/v2/oauth2/authorize", config.auth_base_url);
    let url = reqwest::Url::parse_with_params(&base, &params)
        .map_err(|e| AuthError::InvalidUrl(e.to_string()))?;

    Ok(AuthorizationRequest {
        url: url.to_string(),
        pkce,
    })
}

/// Fetch the client credential and build the authorize URL for `fqdn`
pub async fn begin_authorization(
    client: &OAuthClient,
    fqdn: &str,
    force_login: bool,
    identity: Option<&str>,
) -> Result<AuthorizationRequest, AuthError> {
    let credential = client.credential().await?;
    authorization_request(client.config(), &credential.client, fqdn, force_login, identity)
}

/// Show `url` and read the code the user pastes back
pub fn prompt_for_code<R: BufRead, W: Write>(url: &str, input: &mut R, output: &mut W) -> Result<String, AuthError> {
    writeln!(output, "Please go to this URL and login: {}", url)?;
    write!(output, "Please enter the code you get after login here: ")?;
    output.flush()?;

    let mut code = String::new();
    input.read_line(&mut code)?;
    let code = code.trim();
    if code.is_empty() {
        return Err(AuthError::MissingCode);
    }
    Ok(code.to_string())
}

/// Redeem `code` for a token carrying `authorized_at = now`
pub async fn complete_authorization(
    client: &OAuthClient,
    fqdn: &str,
    request: &AuthorizationRequest,
    code: &str,
) -> Result<Token, AuthError> {
    let grant = client
        .exchange_code(code, &request.pkce.code_verifier)
        .await?;
    let token = grant.into_token(chrono::Utc::now().timestamp());
    token.validate()?;
    info!("Authorization code grant completed for {}", fqdn);
    Ok(token)
}
