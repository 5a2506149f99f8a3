//! `oauth-ssh token ...`

use tracing::info;

use super::AppContext;
use crate::config::{AccountMap, Policy, Token, TokenKind, TokenState};
use crate::error::{Error, Result};
use crate::oauth::{begin_authorization, complete_authorization, prompt_for_code};

/// Start over: drop the host's tokens and cached records
async fn reset_host(ctx: &AppContext, fqdn: &str) -> Result<()> {
    ctx.tokens.revoke(fqdn, TokenKind::Access).await?;
    ctx.tokens.revoke(fqdn, TokenKind::Refresh).await?;
    ctx.store.delete_section(fqdn).await?;
    Ok(())
}

/// Interactive consent flow for `fqdn`
pub async fn authorize(ctx: &AppContext, fqdn: &str, port: u16, identity: Option<&str>) -> Result<()> {
    reset_host(ctx, fqdn).await?;

    let policy = ctx.service(fqdn, port).get_security_policy().await?;
    ctx.store.save_record(fqdn, &policy).await?;

    if let Some(idps) = policy.required_idps() {
        if identity.is_none() {
            return Err(Error::IdentityRequired(idps.to_vec()));
        }
    }

    let identity_id = match identity {
        Some(username) => Some(ctx.oauth.lookup_identity(username).await?),
        None => None,
    };
    let force_login = policy.timeout_minutes().is_some();

    let request = begin_authorization(&ctx.oauth, fqdn, force_login, identity_id.as_deref()).await?;
    let url = request.url.clone();
    let code = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        prompt_for_code(&url, &mut stdin.lock(), &mut std::io::stdout())
    })
    .await
    .map_err(std::io::Error::other)??;
    let token = complete_authorization(&ctx.oauth, fqdn, &request, &code).await?;
    ctx.tokens.save_token(fqdn, &token).await?;
    info!("Authorized {}", fqdn);
    Ok(())
}

pub async fn revoke(ctx: &AppContext, fqdn: &str) -> Result<()> {
    reset_host(ctx, fqdn).await
}

pub async fn show_token(ctx: &AppContext, fqdn: &str) -> Result<()> {
    println!("{}", ctx.tokens.find_access_token(fqdn).await?);
    Ok(())
}

/// Cached account map, fetched with a valid token and cached when missing
pub async fn account_map(ctx: &AppContext, fqdn: &str, port: u16, access_token: Option<&str>) -> Result<AccountMap> {
    if let Some(map) = ctx.store.load_record::<AccountMap>(fqdn).await? {
        return Ok(map);
    }
    let access_token = match access_token {
        Some(token) => token.to_string(),
        None => ctx.tokens.find_access_token(fqdn).await?,
    };
    let map = ctx.service(fqdn, port).get_account_map(&access_token).await?;
    ctx.store.save_record(fqdn, &map).await?;
    Ok(map)
}

pub async fn show_accounts(ctx: &AppContext, fqdn: &str, port: u16) -> Result<()> {
    let map = account_map(ctx, fqdn, port, None).await?;
    println!("permitted_accounts: {:?}", map.accounts());
    Ok(())
}

fn format_time(epoch: Option<i64>) -> String {
    epoch
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string())
}

/// Human-readable summary of what is stored for a host
pub fn describe_status(
    fqdn: &str,
    state: TokenState,
    token: Option<&Token>,
    policy: Option<&Policy>,
    accounts: Option<&AccountMap>,
) -> String {
    let mut lines = vec![format!("Host: {}", fqdn), format!("Token state: {:?}", state)];

    if let Some(token) = token {
        lines.push(format!("Authorized at: {}", format_time(token.authorized_at)));
        lines.push(format!("Access token expires: {}", format_time(token.expires_at)));
    }

    match policy {
        Some(policy) => {
            lines.push(match policy.timeout_minutes() {
                Some(minutes) => format!(
                    "Authentication timeout: {} minutes from authorization",
                    minutes
                ),
                None => "Authentication timeout: none".to_string(),
            });
            lines.push(match policy.required_idps() {
                Some(idps) => format!("Permitted identity providers: {}", idps.join(", ")),
                None => "Permitted identity providers: any".to_string(),
            });
        }
        None => lines.push("Policy: not fetched".to_string()),
    }

    lines.push(match accounts {
        Some(map) => format!("Permitted accounts: {}", map.accounts().join(", ")),
        None => "Permitted accounts: not fetched".to_string(),
    });
    lines.join("\n")
}

pub async fn show_status(ctx: &AppContext, fqdn: &str) -> Result<()> {
    let token: Option<Token> = ctx.store.load_record(fqdn).await?;
    let policy: Option<Policy> = ctx.store.load_record(fqdn).await?;
    let accounts: Option<AccountMap> = ctx.store.load_record(fqdn).await?;
    let state = ctx.tokens.state(fqdn).await?;

    println!(
        "{}",
        describe_status(fqdn, state, token.as_ref(), policy.as_ref(), accounts.as_ref())
    );
    Ok(())
}
