//! Client Settings
//!
//! Built once at startup and handed to every collaborator explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::storage::StorageError;

/// Text printed by the SSH service (and the wrapped ssh/scp binaries) when it
/// asks for a token
pub const TOKEN_PROMPT: &str = "Enter your OAuth token: ";

/// Account used for command exchanges that are not logins
pub const SERVICE_ACCOUNT: &str = "oauth-ssh";

/// Version field sent with every command
pub const PROTOCOL_VERSION: u32 = 1;

/// Section holding installation-wide records
pub const GENERAL_SECTION: &str = "General";

/// Bound on TCP connect and on a single command exchange
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(15);

/// Environment variable selecting the identity provider deployment
pub const ENVIRONMENT_VAR: &str = "OAUTH_SSH_ENVIRONMENT";

const SCOPE_FORMAT: &str = "https://auth.globus.org/scopes/{fqdn}/ssh";
const STORE_FILE: &str = ".oauth-ssh.json";

/// Identity provider deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    /// Parse an environment name; unknown names fall back to production
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("sandbox") => Environment::Sandbox,
            _ => Environment::Production,
        }
    }

    /// Client template used when registering this installation
    pub fn template_id(self) -> &'static str {
        match self {
            Environment::Production => "892ee39b-545a-4505-965a-cff0c96f4e74",
            Environment::Sandbox => "b15c619c-e40e-461a-9a43-0fa21e0f3d35",
        }
    }

    pub fn auth_host(self) -> &'static str {
        match self {
            Environment::Production => "auth.globus.org",
            Environment::Sandbox => "auth.sandbox.globuscs.info",
        }
    }
}

/// Explicit client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub environment: Environment,
    /// Base URL of the identity provider, e.g. `https://auth.globus.org`
    pub auth_base_url: String,
    pub template_id: String,
    /// Per-host record store
    pub store_path: PathBuf,
    /// OpenSSH known_hosts file used for host key trust
    pub known_hosts_path: PathBuf,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Build the configuration for `environment` rooted at `home`
    pub fn for_environment(environment: Environment, home: &Path) -> Self {
        Self {
            environment,
            auth_base_url: format!("https://{}", environment.auth_host()),
            template_id: environment.template_id().to_string(),
            store_path: home.join(STORE_FILE),
            known_hosts_path: home.join(".ssh").join("known_hosts"),
            timeout: NETWORK_TIMEOUT,
        }
    }

    /// Build the configuration from the process environment
    pub fn from_env(store_override: Option<PathBuf>) -> Result<Self, StorageError> {
        let home = dirs::home_dir().ok_or(StorageError::NoConfigDir)?;
        let name = std::env::var(ENVIRONMENT_VAR).ok();
        let mut config = Self::for_environment(Environment::from_name(name.as_deref()), &home);
        if let Some(path) = store_override {
            config.store_path = path;
        }
        Ok(config)
    }

    /// OAuth scope requested for an SSH host
    pub fn scope_for(&self, fqdn: &str) -> String {
        SCOPE_FORMAT.replace("{fqdn}", fqdn)
    }

    /// Redirect URI registered for the out-of-band code display page
    pub fn redirect_uri(&self) -> String {
        format!("{}/v2/web/auth-code", self.auth_base_url)
    }
}
