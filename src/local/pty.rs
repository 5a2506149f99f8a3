//! PTY (Pseudo-Terminal) wrapper
//!
//! Runs the system ssh/scp binary on a pseudo-terminal so its password-style
//! prompts can be observed and answered.

use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

/// Error type for PTY operations
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("Failed to create PTY: {0}")]
    CreateFailed(String),

    #[error("Failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("PTY system error: {0}")]
    PtySystemError(String),
}

/// What to run and how large the terminal is
#[derive(Clone, Debug)]
pub struct PtyConfig {
    pub program: String,
    pub args: Vec<String>,
    pub cols: u16,
    pub rows: u16,
}

impl PtyConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cols: 80,
            rows: 24,
        }
    }

    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }
}

pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

pub struct PtyHandle {
    // Kept open until the child is reaped
    _master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    reader: Option<Box<dyn Read + Send>>,
    writer: SharedWriter,
}

impl PtyHandle {
    /// Spawn `config.program` on a new PTY in the current directory
    pub fn spawn(config: &PtyConfig) -> Result<Self, PtyError> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&config.program);
        cmd.args(&config.args);
        cmd.cwd(std::env::current_dir()?);

        tracing::info!("Spawning {} on a PTY", config.program);
        let child = pair.slave.spawn_command(cmd).map_err(|e| PtyError::SpawnFailed {
            program: config.program.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!("PTY child spawned, PID: {:?}", child.process_id());

        // Our copy of the slave must close for EOF to reach the master
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::PtySystemError(format!("Failed to clone reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::PtySystemError(format!("Failed to take writer: {}", e)))?;

        Ok(Self {
            _master: pair.master,
            child,
            reader: Some(reader),
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    /// Output side of the terminal; can be taken once
    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    /// Input side of the terminal, shared with the stdin copier
    pub fn writer(&self) -> SharedWriter {
        self.writer.clone()
    }

    /// Wait for the child and return its exit code
    pub fn wait(&mut self) -> Result<u32, PtyError> {
        let status = self
            .child
            .wait()
            .map_err(|e| PtyError::PtySystemError(e.to_string()))?;
        Ok(status.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_config() {
        let config = PtyConfig::new("ssh", vec!["host".into()]).with_size(120, 40);
        assert_eq!(config.program, "ssh");
        assert_eq!((config.cols, config.rows), (120, 40));
        assert_eq!(PtyConfig::new("scp", vec![]).cols, 80);
    }
}
