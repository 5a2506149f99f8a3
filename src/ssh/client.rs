//! SSH transport setup using russh
//!
//! Opens the TCP connection, negotiates the transport and checks the server's
//! host key against the known_hosts store, asking the user on first contact.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::PublicKey;
use tracing::{debug, info, warn};

use super::error::SshError;
use super::known_hosts::{HostKey, HostKeyVerification, KnownHostsStore};

/// Asks whether an unknown host key should be trusted
pub trait HostKeyPrompt: Send + Sync {
    fn confirm(&self, host: &str, key: &HostKey) -> std::io::Result<bool>;
}

/// Prompts on the controlling terminal (stderr / stdin)
pub struct TerminalPrompt;

impl HostKeyPrompt for TerminalPrompt {
    fn confirm(&self, host: &str, key: &HostKey) -> std::io::Result<bool> {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stderr();
        ask_to_continue(&mut input, &mut output, host, key)
    }
}

/// OpenSSH-style confirmation; repeats until yes/y/no/n, end of input is "no"
pub fn ask_to_continue<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    host: &str,
    key: &HostKey,
) -> std::io::Result<bool> {
    writeln!(output, "The authenticity of host '{}' can't be established.", host)?;
    writeln!(output, "{} key fingerprint is {}.", key.label(), key.fingerprint())?;

    loop {
        write!(output, "Are you sure you want to continue connecting (yes/no)? ")?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            writeln!(output)?;
            return Ok(false);
        }
        match answer.trim() {
            "yes" | "y" => return Ok(true),
            "no" | "n" => return Ok(false),
            _ => continue,
        }
    }
}

/// Host key trust policy shared by every connection of this process
#[derive(Clone)]
pub struct HostTrust {
    known_hosts: Arc<KnownHostsStore>,
    prompt: Arc<dyn HostKeyPrompt>,
}

impl HostTrust {
    pub fn new(known_hosts: Arc<KnownHostsStore>, prompt: Arc<dyn HostKeyPrompt>) -> Self {
        Self { known_hosts, prompt }
    }

    /// Accept a known key, ask about an unknown one, refuse a changed one
    pub fn verify_or_prompt(&self, host: &str, port: u16, key: &HostKey) -> Result<(), SshError> {
        match self.known_hosts.verify(host, port, key) {
            HostKeyVerification::Verified => {
                debug!("Host key verified for {}:{}", host, port);
                Ok(())
            }
            HostKeyVerification::Changed { .. } => Err(SshError::UnknownHostKey),
            HostKeyVerification::Unknown => {
                if !self.prompt.confirm(host, key)? {
                    info!("Host key for {}:{} refused", host, port);
                    return Err(SshError::UnknownHostKey);
                }
                if let Err(e) = self.known_hosts.add_host(host, port, key) {
                    warn!("Failed to save host key: {}", e);
                }
                Ok(())
            }
        }
    }
}

/// Client handler for russh callbacks
pub struct ClientHandler {
    host: String,
    port: u16,
    trust: HostTrust,
}

impl ClientHandler {
    pub fn new(host: impl Into<String>, port: u16, trust: HostTrust) -> Self {
        Self {
            host: host.into(),
            port,
            trust,
        }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        let key = HostKey::from_public_key(server_public_key);
        self.trust.verify_or_prompt(&self.host, self.port, &key)?;
        Ok(true)
    }
}

/// Resolve `host`, connect within `timeout` and negotiate the SSH transport.
///
/// No authentication is attempted.
pub async fn connect(
    host: &str,
    port: u16,
    trust: HostTrust,
    timeout: Duration,
) -> Result<client::Handle<ClientHandler>, SshError> {
    let socket_addr = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| {
            debug!("Lookup of {} failed: {}", host, e);
            SshError::HostLookupFailed(host.to_string())
        })?
        .next()
        .ok_or_else(|| SshError::HostLookupFailed(host.to_string()))?;

    info!("Connecting to SSH server at {}", socket_addr);

    let stream = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(socket_addr))
        .await
        .map_err(|_| SshError::ConnectionTimeout(format!("{}:{}", host, port)))?
        .map_err(|e| SshError::ConnectionFailed(e.to_string()))?;

    let ssh_config = Arc::new(client::Config {
        inactivity_timeout: None,
        ..Default::default()
    });

    // Not bounded: the host key prompt may wait on the user
    let handle = client::connect_stream(ssh_config, stream, ClientHandler::new(host, port, trust)).await?;
    debug!("SSH handshake completed with {}:{}", host, port);
    Ok(handle)
}
