//! SSH Error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshError {
    #[error("ssh: Could not resolve hostname {0}: Name or service not known")]
    HostLookupFailed(String),

    #[error("Timed out connecting to {0}")]
    ConnectionTimeout(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Host key verification failed.")]
    UnknownHostKey,

    #[error(
        "Authorization to this host has failed. Likely causes are no local account \
         or a misconfigured service."
    )]
    AuthorizationFailure,

    #[error("The access token is invalid. Use `oauth-ssh token authorize {0}`.")]
    InvalidToken(String),

    #[error(
        "The access token no longer meets this site's security policy requirements. \
         Use `oauth-ssh token authorize {0}`."
    )]
    SessionViolation(String),

    #[error("Unexpected reply from the SSH service: {0}")]
    UnexpectedSshReply(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("SSH protocol error: {0}")]
    ProtocolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        match err {
            russh::Error::UnknownKey => SshError::UnknownHostKey,
            russh::Error::IO(e) => SshError::IoError(e),
            other => SshError::ProtocolError(other.to_string()),
        }
    }
}
