//! `oauth-ssh connect [-l user] [-p port] [user@]fqdn [command...]`

use tracing::debug;

use super::token::account_map;
use super::AppContext;
use crate::config::AccountMap;
use crate::error::{Error, Result};
use crate::ssh::run_interactive;

/// Split `[user@]fqdn`
pub fn split_destination(destination: &str) -> (Option<&str>, &str) {
    match destination.rsplit_once('@') {
        Some((user, host)) if !user.is_empty() => (Some(user), host),
        Some((_, host)) => (None, host),
        None => (None, destination),
    }
}

/// The local user if permitted, else the only permitted account
pub fn select_account(map: &AccountMap, local_user: &str) -> Option<String> {
    let accounts = map.accounts();
    if accounts.iter().any(|a| a == local_user) {
        return Some(local_user.to_string());
    }
    match accounts {
        [only] => Some(only.clone()),
        _ => None,
    }
}

/// Log in and run an interactive session; returns the remote exit status
pub async fn connect(
    ctx: &AppContext,
    login: Option<&str>,
    port: u16,
    destination: &str,
    command: &[String],
) -> Result<u32> {
    let (user, fqdn) = split_destination(destination);
    let access_token = ctx.tokens.find_access_token(fqdn).await?;

    let account = match user.or(login) {
        Some(account) => account.to_string(),
        None => {
            let map = account_map(ctx, fqdn, port, Some(&access_token)).await?;
            select_account(&map, &whoami::username()).ok_or(Error::AccountUnresolved)?
        }
    };
    debug!("Logging in to {} as {}", fqdn, account);

    let handle = ctx.service(fqdn, port).login(&access_token, &account).await?;
    let command = (!command.is_empty()).then(|| command.join(" "));
    Ok(run_interactive(handle, command).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(accounts: &[&str]) -> AccountMap {
        AccountMap {
            permitted_accounts: Some(accounts.iter().map(|a| a.to_string()).collect()),
        }
    }

    #[test]
    fn test_split_destination() {
        assert_eq!(split_destination("ssh.example.org"), (None, "ssh.example.org"));
        assert_eq!(
            split_destination("alice@ssh.example.org"),
            (Some("alice"), "ssh.example.org")
        );
        assert_eq!(split_destination("@ssh.example.org"), (None, "ssh.example.org"));
    }

    #[test]
    fn test_select_account() {
        assert_eq!(select_account(&map(&["bob", "alice"]), "alice").as_deref(), Some("alice"));
        assert_eq!(select_account(&map(&["shared"]), "alice").as_deref(), Some("shared"));
        assert_eq!(select_account(&map(&["bob", "carol"]), "alice"), None);
        assert_eq!(select_account(&map(&[]), "alice"), None);
        assert_eq!(select_account(&AccountMap::default(), "alice"), None);
    }
}
