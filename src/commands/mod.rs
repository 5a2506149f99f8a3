//! CLI command handlers
//!
//! Each handler receives the [`AppContext`] built once in `main`.

pub mod connect;
#[cfg(feature = "legacy-wrapper")]
pub mod legacy;
pub mod token;

use std::sync::Arc;

use crate::config::{ClientConfig, ConfigStore};
use crate::error::Result;
use crate::oauth::OAuthClient;
use crate::ssh::{HostTrust, KnownHostsStore, SshService, SshTransport, TerminalPrompt};
use crate::token::TokenManager;

/// Collaborators shared by every command of one invocation
pub struct AppContext {
    pub config: ClientConfig,
    pub store: ConfigStore,
    pub oauth: Arc<OAuthClient>,
    pub tokens: TokenManager,
    pub trust: HostTrust,
}

impl AppContext {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store = ConfigStore::with_path(config.store_path.clone());
        let oauth = Arc::new(OAuthClient::new(config.clone(), store.clone())?);
        let tokens = TokenManager::new(store.clone(), oauth.clone());
        let known_hosts = Arc::new(KnownHostsStore::with_path(&config.known_hosts_path));
        let trust = HostTrust::new(known_hosts, Arc::new(TerminalPrompt));

        Ok(Self {
            config,
            store,
            oauth,
            tokens,
            trust,
        })
    }

    /// Command interface of the SSH service at `host:port`
    pub fn service(&self, host: &str, port: u16) -> SshService<SshTransport> {
        let transport = SshTransport::new(host, port, self.trust.clone(), self.config.timeout);
        SshService::new(host, transport)
    }
}
