//! Incremental newline framing for device streams
//!
//! Devices push text in arbitrary chunks: a single read may carry half a
//! line, several lines, or a line split in the middle of a multi-byte
//! character. [`LineFramer`] holds the unconsumed tail between reads and
//! yields only complete, non-empty lines.
//!
//! ## Resource growth
//!
//! The pending buffer has no upper bound. A peer that streams data without
//! ever sending `\n` grows it until the connection drops. Serial bridge
//! firmware emits newline-terminated output, so this is accepted.

/// Splits a chunked byte stream into `\n`-delimited lines.
#[derive(Debug, Default, Clone)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order.
    ///
    /// The `\n` separator is not included. A `\r` before it is kept, so the
    /// caller sees the line exactly as sent. Zero-length lines are dropped.
    /// Invalid UTF-8 is replaced lossily once a line is complete, so a
    /// character split across chunks decodes correctly.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            self.pending.extend_from_slice(head);
            if !self.pending.is_empty() {
                lines.push(String::from_utf8_lossy(&self.pending).into_owned());
            }
            self.pending.clear();
            rest = &tail[1..];
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    /// Text convenience wrapper around [`push_bytes`](Self::push_bytes)
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.push_bytes(chunk.as_bytes())
    }

    /// Incomplete trailing fragment held for the next chunk
    pub fn pending(&self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_lines(input: &str) -> Vec<String> {
        input
            .split('\n')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_single_complete_line() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push("Boot complete\n"), vec!["Boot complete"]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_partial_line_is_held_until_newline() {
        let mut framer = LineFramer::new();
        assert!(framer.push("WiFi conn").is_empty());
        assert_eq!(framer.pending(), "WiFi conn");
        assert_eq!(framer.push("ected\nIP: "), vec!["WiFi connected"]);
        assert_eq!(framer.pending(), "IP: ");
    }

    #[test]
    fn test_empty_lines_are_discarded() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push("a\n\n\nb\n"), vec!["a", "b"]);
        assert!(framer.push("\n").is_empty());
    }

    #[test]
    fn test_carriage_return_is_preserved() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push("OK\r\n"), vec!["OK\r"]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut framer = LineFramer::new();
        let bytes = "temp 21°C\n".as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC2).unwrap() + 1;
        assert!(framer.push_bytes(&bytes[..split]).is_empty());
        assert_eq!(framer.push_bytes(&bytes[split..]), vec!["temp 21°C"]);
    }

    #[test]
    fn test_chunk_boundary_independence() {
        let input = "Boot complete\nWiFi connected\n\nIP: 192.168.4.1\r\n---\npartial";
        let expected = expected_lines(input);
        // Last piece has no terminator and stays pending
        let expected = &expected[..expected.len() - 1];

        let bytes = input.as_bytes();
        for a in 0..=bytes.len() {
            for b in a..=bytes.len() {
                let mut framer = LineFramer::new();
                let mut got = framer.push_bytes(&bytes[..a]);
                got.extend(framer.push_bytes(&bytes[a..b]));
                got.extend(framer.push_bytes(&bytes[b..]));
                assert_eq!(got, expected, "split at {a}/{b}");
                assert_eq!(framer.pending(), "partial");
            }
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = "one\ntwo\nthree\n";
        let mut framer = LineFramer::new();
        let got: Vec<String> = input
            .as_bytes()
            .iter()
            .flat_map(|b| framer.push_bytes(std::slice::from_ref(b)))
            .collect();
        assert_eq!(got, vec!["one", "two", "three"]);
    }
}
