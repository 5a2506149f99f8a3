//! Legacy ssh/scp wrapper
//!
//! Runs the system binary on a PTY, copies local stdin to it and its output to
//! stdout, answering the token prompt once through [`MarkerInjector`].

use std::io::{self, Read, Write};

use tracing::{debug, info};

use super::inject::MarkerInjector;
use super::pty::{PtyConfig, PtyError, PtyHandle, SharedWriter};
use super::terminal::{terminal_size, RawModeGuard, TerminalMode};
use crate::config::TOKEN_PROMPT;

/// Copy child output to `output` until EOF, injecting the token on the way
pub fn pump<R: Read, W: Write>(
    reader: &mut R,
    child_input: &SharedWriter,
    injector: &mut MarkerInjector,
    output: &mut W,
) -> io::Result<()> {
    let mut buf = [0u8; 4096];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // Linux reports EIO on the master once the child side closes
            Err(e) => {
                debug!("PTY read ended: {}", e);
                break;
            }
        };

        let filtered = injector.feed(&buf[..n]);
        if let Some(payload) = filtered.inject {
            info!("Token prompt seen, answering");
            let mut input = child_input.lock();
            input.write_all(&payload)?;
            input.flush()?;
        }
        if !filtered.display.is_empty() {
            output.write_all(&filtered.display)?;
            output.flush()?;
        }
    }

    output.write_all(&injector.finish())?;
    output.flush()
}

fn spawn_stdin_copier(child_input: SharedWriter) {
    std::thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let mut input = child_input.lock();
                    if input.write_all(&buf[..n]).and_then(|_| input.flush()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Run `program args...` and return its exit code
pub fn run_wrapped(program: &str, args: Vec<String>, access_token: &str) -> Result<u32, PtyError> {
    let (cols, rows) = terminal_size();
    let config = PtyConfig::new(program, args).with_size(
        u16::try_from(cols).unwrap_or(u16::MAX),
        u16::try_from(rows).unwrap_or(u16::MAX),
    );

    let mut pty = PtyHandle::spawn(&config)?;
    let mut reader = pty
        .take_reader()
        .ok_or_else(|| PtyError::PtySystemError("PTY reader already taken".to_string()))?;
    let child_input = pty.writer();

    let guard = RawModeGuard::enter(TerminalMode::Raw)?;
    spawn_stdin_copier(child_input.clone());

    let mut injector = MarkerInjector::new(TOKEN_PROMPT, access_token);
    let stdout = io::stdout();
    let result = pump(&mut reader, &child_input, &mut injector, &mut stdout.lock());
    drop(guard);
    result?;

    let code = pty.wait()?;
    debug!("{} exited with {}", program, code);
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Reader that hands out one scripted chunk per call
    struct Chunks(Vec<Vec<u8>>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::Error::from_raw_os_error(5));
            }
            let chunk = self.0.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pump_answers_split_prompt() {
        let mut reader = Chunks(vec![
            b"Welcome\r\nEnter your OA".to_vec(),
            b"uth token: ".to_vec(),
            b"\r\nlast login".to_vec(),
        ]);
        let child_sink = Sink::default();
        let child_input: SharedWriter = Arc::new(Mutex::new(Box::new(child_sink.clone())));
        let mut injector = MarkerInjector::new(TOKEN_PROMPT, "AT");
        let mut output = Vec::new();

        pump(&mut reader, &child_input, &mut injector, &mut output).unwrap();

        assert_eq!(output, b"Welcome\r\n\r\nlast login".to_vec());
        assert_eq!(*child_sink.0.lock(), b"AT\n".to_vec());
    }

    #[test]
    fn test_pump_releases_tail_at_eof() {
        let mut reader = Chunks(vec![b"done. Enter".to_vec()]);
        let child_sink = Sink::default();
        let child_input: SharedWriter = Arc::new(Mutex::new(Box::new(child_sink.clone())));
        let mut injector = MarkerInjector::new(TOKEN_PROMPT, "AT");
        let mut output = Vec::new();

        pump(&mut reader, &child_input, &mut injector, &mut output).unwrap();

        assert_eq!(output, b"done. Enter".to_vec());
        assert!(child_sink.0.lock().is_empty());
    }
}
