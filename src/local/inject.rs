//! Streaming marker injection
//!
//! Watches a child's terminal output for a literal prompt and answers it once.
//! Matching is incremental (KMP), so a prompt split across reads is still
//! found. Bytes that might begin the prompt are held back until they either
//! complete it (then they are swallowed) or can no longer do so (then they are
//! released in order).

/// Result of feeding one chunk
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filtered {
    /// Bytes to show the user
    pub display: Vec<u8>,
    /// Bytes to write back to the child, set once at the first full match
    pub inject: Option<Vec<u8>>,
}

pub struct MarkerInjector {
    marker: Vec<u8>,
    /// failure[i]: length of the longest proper prefix of marker[..=i] that is also its suffix
    failure: Vec<usize>,
    /// Held-back bytes are always marker[..matched]
    matched: usize,
    payload: Option<Vec<u8>>,
}

impl MarkerInjector {
    /// Inject `token` followed by a newline at the first occurrence of `marker`
    pub fn new(marker: &str, token: &str) -> Self {
        let marker = marker.as_bytes().to_vec();
        let failure = failure_function(&marker);
        let mut payload = token.as_bytes().to_vec();
        payload.push(b'\n');
        Self {
            marker,
            failure,
            matched: 0,
            payload: Some(payload),
        }
    }

    /// True once the injection has been handed out
    pub fn injected(&self) -> bool {
        self.payload.is_none()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Filtered {
        let mut out = Filtered::default();
        if self.injected() || self.marker.is_empty() {
            out.display.extend_from_slice(chunk);
            return out;
        }

        for (i, &byte) in chunk.iter().enumerate() {
            while self.matched > 0 && self.marker[self.matched] != byte {
                let keep = self.failure[self.matched - 1];
                out.display
                    .extend_from_slice(&self.marker[..self.matched - keep]);
                self.matched = keep;
            }

            if self.marker[self.matched] == byte {
                self.matched += 1;
            } else {
                out.display.push(byte);
            }

            if self.matched == self.marker.len() {
                self.matched = 0;
                out.inject = self.payload.take();
                out.display.extend_from_slice(&chunk[i + 1..]);
                break;
            }
        }
        out
    }

    /// Release whatever is still held back at end of stream
    pub fn finish(&mut self) -> Vec<u8> {
        let held = self.marker[..self.matched].to_vec();
        self.matched = 0;
        held
    }
}

fn failure_function(pattern: &[u8]) -> Vec<usize> {
    let mut failure = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = failure[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        failure[i] = k;
    }
    failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TOKEN_PROMPT;

    /// Feed `input` in pieces of `size`, returning (display, injections)
    fn run(marker: &str, input: &[u8], size: usize) -> (Vec<u8>, Vec<Vec<u8>>) {
        let mut injector = MarkerInjector::new(marker, "TOKEN");
        let mut display = Vec::new();
        let mut injections = Vec::new();
        for chunk in input.chunks(size.max(1)) {
            let out = injector.feed(chunk);
            display.extend(out.display);
            injections.extend(out.inject);
        }
        display.extend(injector.finish());
        (display, injections)
    }

    #[test]
    fn test_failure_function() {
        assert_eq!(failure_function(b"aabaaab"), vec![0, 1, 0, 1, 2, 2, 3]);
        assert_eq!(failure_function(b"abcd"), vec![0, 0, 0, 0]);
        assert!(failure_function(b"").is_empty());
    }

    #[test]
    fn test_prompt_replaced_once_at_every_chunk_size() {
        let input = format!("Banner\r\n{}{}after\r\n", TOKEN_PROMPT, TOKEN_PROMPT);
        for size in 1..=input.len() {
            let (display, injections) = run(TOKEN_PROMPT, input.as_bytes(), size);
            assert_eq!(
                String::from_utf8(display).unwrap(),
                format!("Banner\r\n{}after\r\n", TOKEN_PROMPT),
                "chunk size {}",
                size
            );
            assert_eq!(injections, vec![b"TOKEN\n".to_vec()], "chunk size {}", size);
        }
    }

    #[test]
    fn test_pass_through_without_marker() {
        let input = b"Enter your OAuth tok\r\nEnter your password: Enter";
        for size in 1..=input.len() {
            let (display, injections) = run(TOKEN_PROMPT, input, size);
            assert_eq!(display, input.to_vec(), "chunk size {}", size);
            assert!(injections.is_empty());
        }
    }

    #[test]
    fn test_overlapping_prefix() {
        // "aab" inside "aaab": the first 'a' must be released, not lost
        for size in 1..=5 {
            let (display, injections) = run("aab", b"xaaabz", size);
            assert_eq!(display, b"xaz".to_vec(), "chunk size {}", size);
            assert_eq!(injections.len(), 1);
        }
    }

    #[test]
    fn test_held_bytes_released_at_finish() {
        let mut injector = MarkerInjector::new(TOKEN_PROMPT, "TOKEN");
        let out = injector.feed(b"ok\nEnter your");
        assert_eq!(out.display, b"ok\n".to_vec());
        assert_eq!(out.inject, None);
        assert_eq!(injector.finish(), b"Enter your".to_vec());
        assert!(injector.finish().is_empty());
    }

    #[test]
    fn test_pass_through_after_injection() {
        let mut injector = MarkerInjector::new("P: ", "T");
        assert_eq!(injector.feed(b"P: ").inject, Some(b"T\n".to_vec()));
        assert!(injector.injected());

        let out = injector.feed(b"P: again");
        assert_eq!(out.display, b"P: again".to_vec());
        assert_eq!(out.inject, None);
    }

    #[test]
    fn test_empty_marker_never_matches() {
        let (display, injections) = run("", b"anything", 3);
        assert_eq!(display, b"anything".to_vec());
        assert!(injections.is_empty());
    }
}
