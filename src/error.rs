//! Top-level error type
//!
//! Every failure reaches `main` as one of these and is printed as a single
//! message.

use crate::config::StorageError;
#[cfg(feature = "legacy-wrapper")]
use crate::local::PtyError;
use crate::oauth::AuthError;
use crate::ssh::SshError;
use crate::token::TokenError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Ssh(#[from] SshError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[cfg(feature = "legacy-wrapper")]
    #[error(transparent)]
    Pty(#[from] PtyError),

    #[error(
        "This host requires an identity from one of: {}. Use `--identity <user>@<provider>`.",
        .0.join(", ")
    )]
    IdentityRequired(Vec<String>),

    #[error("Could not determine remote account to use. Please use -l <account>.")]
    AccountUnresolved,

    #[error("Could not find the target host in the {0} arguments.")]
    MissingHost(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
