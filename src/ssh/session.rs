//! Interactive session on an authenticated connection
//!
//! Runs a remote command, or a shell on a remote pty, and relays I/O between
//! the channel and the local terminal until the channel closes.

use russh::client::Handle;
use russh::ChannelMsg;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use super::client::ClientHandler;
use super::error::SshError;
use crate::local::{terminal_size, terminal_type, RawModeGuard, TerminalMode};

/// Exit code reported when the server sends no exit status
pub const NO_EXIT_STATUS: u32 = 255;

/// Run `command` (or a login shell when `None`) and return the remote exit status
pub async fn run_interactive(handle: Handle<ClientHandler>, command: Option<String>) -> Result<u32, SshError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| SshError::ChannelError(format!("Failed to open session: {}", e)))?;

    let mode = match &command {
        Some(cmd) => {
            debug!("Executing remote command");
            channel
                .exec(true, cmd.as_str())
                .await
                .map_err(|e| SshError::ChannelError(format!("Exec request failed: {}", e)))?;
            TerminalMode::Cbreak
        }
        None => {
            let (cols, rows) = terminal_size();
            channel
                .request_pty(false, &terminal_type(), cols, rows, 0, 0, &[])
                .await
                .map_err(|e| SshError::ChannelError(format!("PTY request failed: {}", e)))?;
            channel
                .request_shell(true)
                .await
                .map_err(|e| SshError::ChannelError(format!("Shell request failed: {}", e)))?;
            TerminalMode::Raw
        }
    };

    // Restored on every exit path below
    let _guard = RawModeGuard::enter(mode)?;

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let mut buf = vec![0u8; 1024];
    let mut stdin_open = true;
    let mut exit_status = None;

    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.write_all(&data).await?;
                        stderr.flush().await?;
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                    debug!("Remote exit status {}", status);
                    exit_status = Some(status);
                }
                Some(ChannelMsg::Eof) => debug!("Remote EOF"),
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            },
            read = stdin.read(&mut buf), if stdin_open => match read? {
                0 => {
                    debug!("Local stdin closed");
                    stdin_open = false;
                    channel.eof().await?;
                }
                n => channel.data(&buf[..n]).await?,
            },
        }
    }

    let code = exit_status.unwrap_or(NO_EXIT_STATUS);
    info!("Session closed with status {}", code);
    Ok(code)
}
