//! SSH module - command channel and sessions on top of russh
//!
//! Requests to the SSH service travel inside keyboard-interactive
//! authentication (see [`command`]); a successful login hands back the
//! authenticated connection for an interactive session.

pub mod client;
pub mod command;
pub mod error;
pub mod known_hosts;
pub mod service;
pub mod session;

pub use client::{connect, ClientHandler, HostKeyPrompt, HostTrust, TerminalPrompt};
pub use command::{CommandTransport, Exchange, Request, SshTransport};
pub use error::SshError;
pub use known_hosts::{HostKey, HostKeyVerification, KnownHostsStore};
pub use service::SshService;
pub use session::run_interactive;
