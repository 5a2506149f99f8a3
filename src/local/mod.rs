//! Local terminal support module
//!
//! Terminal modes for remote sessions, the token-prompt injector and the
//! PTY wrapper around the system ssh/scp binaries.

pub mod args;
pub mod inject;
#[cfg(feature = "legacy-wrapper")]
pub mod legacy;
#[cfg(feature = "legacy-wrapper")]
pub mod pty;
pub mod terminal;

pub use args::{scp_host, ssh_host};
pub use inject::{Filtered, MarkerInjector};
#[cfg(feature = "legacy-wrapper")]
pub use legacy::run_wrapped;
#[cfg(feature = "legacy-wrapper")]
pub use pty::{PtyConfig, PtyError, PtyHandle};
pub use terminal::{terminal_size, terminal_type, RawModeGuard, TerminalMode};
