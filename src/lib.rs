//! oauth-ssh - SSH and SCP sessions authenticated with OAuth bearer tokens
//!
//! Tokens are cached per host and kept fresh by [`token::TokenManager`]. The
//! SSH service is queried through [`ssh::SshService`], whose requests travel in
//! keyboard-interactive authentication. The `legacy-wrapper` feature adds a
//! PTY wrapper that feeds the token to the system ssh/scp binaries.

pub mod commands;
pub mod config;
pub mod error;
pub mod local;
pub mod oauth;
pub mod ssh;
pub mod token;

pub use error::{Error, Result};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber; `RUST_LOG` overrides `default_level`.
///
/// Logs go to stderr so they never mix with remote output.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
