//! Newline framing for inbound chunks.
//!
//! The device terminates every record with `\n` (usually `\r\n`). A single
//! TCP read can carry zero, one or many records, and a record can straddle
//! reads, so each connection keeps a [`LineBuffer`].

use std::borrow::Cow;
use tracing::warn;

/// Longest unterminated record held before it is discarded
pub const MAX_PARTIAL_LINE: usize = 1024 * 1024;

/// Decode a raw chunk read from either channel.
pub fn decode_chunk(data: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(data)
}

/// Split a chunk into trimmed, non-empty lines.
pub fn lines(chunk: &str) -> impl Iterator<Item = &str> {
    chunk
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

/// Reassembles records across reads from one connection.
///
/// Bytes after the last `\n` of a chunk are held until a later chunk
/// completes them. Buffering raw bytes keeps multi-byte UTF-8 sequences
/// split across reads intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every record it completes, trimmed, blanks
    /// dropped.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(data);

        let Some(end) = self.partial.iter().rposition(|&b| b == b'\n') else {
            if self.partial.len() > MAX_PARTIAL_LINE {
                warn!(
                    bytes = self.partial.len(),
                    "Discarding unterminated record over size limit"
                );
                self.partial.clear();
            }
            return Vec::new();
        };

        let rest = self.partial.split_off(end + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        lines(&decode_chunk(&complete))
            .map(str::to_string)
            .collect()
    }

    /// Bytes held back waiting for a terminator
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    pub fn clear(&mut self) {
        self.partial.clear();
    }
}

/// Frame an outbound command. Empty commands produce nothing.
pub fn frame_command(command: &str) -> Option<String> {
    if command.is_empty() {
        return None;
    }
    Some(format!("{command}\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_crlf_records() {
        let got: Vec<_> = lines("PING\r\nOk\r\nPROGRAM_CHANGED CHANNEL=\"CH_0\"\r\n").collect();
        assert_eq!(got, vec!["PING", "Ok", "PROGRAM_CHANGED CHANNEL=\"CH_0\""]);
    }

    #[test]
    fn drops_blank_and_trailing_fragments() {
        let got: Vec<_> = lines("\n\n  \r\nabc\n\n").collect();
        assert_eq!(got, vec!["abc"]);
    }

    #[test]
    fn chunk_without_terminator_is_one_line() {
        let got: Vec<_> = lines("  eyJQUkVWSUVXIjoiMSJ9 ").collect();
        assert_eq!(got, vec!["eyJQUkVWSUVXIjoiMSJ9"]);
    }

    #[test]
    fn empty_chunk_yields_nothing() {
        assert_eq!(lines("").count(), 0);
    }

    #[test]
    fn lossy_decode_keeps_valid_text() {
        let chunk = decode_chunk(b"Ok\r\n\xffPING\n");
        let got: Vec<_> = lines(&chunk).collect();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], "Ok");
        assert!(got[1].ends_with("PING"));
    }

    #[test]
    fn buffer_holds_unterminated_tail() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"Ok\r\neyJQUk"), vec!["Ok"]);
        assert_eq!(buffer.pending(), 6);
        assert!(buffer.push(b"VWSUVXIjoiMSJ9").is_empty());
        assert_eq!(buffer.push(b"\r\nPING\r\n"), vec!["eyJQUkVWSUVXIjoiMSJ9", "PING"]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn buffer_split_between_cr_and_lf() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"3.2.1\r").is_empty());
        assert_eq!(buffer.push(b"\n"), vec!["3.2.1"]);
    }

    #[test]
    fn buffer_keeps_split_utf8() {
        let text = "NAME=Caméra\n".as_bytes();
        let split = text.iter().position(|&b| b == 0xc3).unwrap() + 1;
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(&text[..split]).is_empty());
        assert_eq!(buffer.push(&text[split..]), vec!["NAME=Caméra"]);
    }

    #[test]
    fn buffer_clear_drops_tail() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"half a rec");
        buffer.clear();
        assert_eq!(buffer.push(b"ord\n"), vec!["ord"]);
    }

    #[test]
    fn oversized_tail_is_discarded() {
        let mut buffer = LineBuffer::new();
        buffer.push(&vec![b'A'; MAX_PARTIAL_LINE + 1]);
        assert_eq!(buffer.pending(), 0);
        assert_eq!(buffer.push(b"Ok\n"), vec!["Ok"]);
    }

    #[test]
    fn command_framing() {
        assert_eq!(frame_command("UPDATEGUI").as_deref(), Some("UPDATEGUI\r\n"));
        assert_eq!(frame_command(""), None);
    }
}
