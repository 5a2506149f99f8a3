//! Local terminal mode and size
//!
//! The mode guard switches stdin out of line mode for the duration of a remote
//! session and restores the saved settings when dropped.

use std::io::IsTerminal;

use tracing::debug;

/// How far stdin is taken out of canonical mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    /// Byte-at-a-time input, signals still generated locally (remote command)
    Cbreak,
    /// Everything forwarded, including control characters (remote shell)
    Raw,
}

/// Restores the saved terminal settings on drop
pub struct RawModeGuard {
    #[cfg(unix)]
    original: nix::sys::termios::Termios,
}

impl RawModeGuard {
    /// Switch stdin to `mode`; `None` when stdin is not a terminal
    #[cfg(unix)]
    pub fn enter(mode: TerminalMode) -> std::io::Result<Option<Self>> {
        use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, LocalFlags, SetArg, SpecialCharacterIndices};

        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }

        let original = tcgetattr(&stdin)?;
        let mut settings = original.clone();
        match mode {
            TerminalMode::Raw => cfmakeraw(&mut settings),
            TerminalMode::Cbreak => {
                settings.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
                settings.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
                settings.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
            }
        }
        tcsetattr(&stdin, SetArg::TCSADRAIN, &settings)?;
        debug!("Terminal switched to {:?} mode", mode);
        Ok(Some(Self { original }))
    }

    #[cfg(not(unix))]
    pub fn enter(_mode: TerminalMode) -> std::io::Result<Option<Self>> {
        Ok(None)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            let stdin = std::io::stdin();
            if let Err(e) = nix::sys::termios::tcsetattr(&stdin, nix::sys::termios::SetArg::TCSADRAIN, &self.original) {
                tracing::warn!("Failed to restore terminal settings: {}", e);
            } else {
                debug!("Terminal settings restored");
            }
        }
    }
}

#[cfg(unix)]
nix::ioctl_read_bad!(tiocgwinsz, nix::libc::TIOCGWINSZ, nix::libc::winsize);

/// Current terminal size as (cols, rows)
///
/// Falls back to `COLUMNS`/`LINES` and then 80x24.
pub fn terminal_size() -> (u32, u32) {
    #[cfg(unix)]
    {
        use std::os::fd::AsRawFd;

        let stdout = std::io::stdout();
        if stdout.is_terminal() {
            let mut size = nix::libc::winsize {
                ws_row: 0,
                ws_col: 0,
                ws_xpixel: 0,
                ws_ypixel: 0,
            };
            // SAFETY: stdout is an open descriptor and `size` outlives the call
            let res = unsafe { tiocgwinsz(stdout.as_raw_fd(), &mut size) };
            if res.is_ok() && size.ws_col > 0 && size.ws_row > 0 {
                return (u32::from(size.ws_col), u32::from(size.ws_row));
            }
        }
    }

    size_from_env(std::env::var("COLUMNS").ok(), std::env::var("LINES").ok())
}

fn size_from_env(columns: Option<String>, lines: Option<String>) -> (u32, u32) {
    let parse = |v: Option<String>, default: u32| {
        v.and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(default)
    };
    (parse(columns, 80), parse(lines, 24))
}

/// Terminal type advertised in a pty request
pub fn terminal_type() -> String {
    std::env::var("TERM")
        .ok()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "xterm-256color".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_from_env() {
        assert_eq!(size_from_env(None, None), (80, 24));
        assert_eq!(size_from_env(Some("132".into()), Some("50".into())), (132, 50));
        assert_eq!(size_from_env(Some("0".into()), Some("abc".into())), (80, 24));
    }
}
