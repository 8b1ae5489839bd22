//! Line reassembly for the device log.
//!
//! Device output arrives in arbitrary-sized text chunks. The reassembler
//! accumulates them and emits complete lines split on `\n`, stripping one
//! trailing `\r` per line, so CRLF and LF output both produce clean lines.
//! Whatever follows the last newline stays pending until more data arrives
//! or the stream ends.

/// Stateful accumulator turning text chunks into complete lines.
#[derive(Debug, Default)]
pub struct LineReassembler {
    partial: String,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self {
            partial: String::new(),
        }
    }

    /// Append a chunk and return every line it completes, in order.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.partial.push_str(chunk);
        if !self.partial.contains('\n') {
            return Vec::new();
        }

        let buffered = std::mem::take(&mut self.partial);
        let mut lines = Vec::new();
        let mut rest = buffered.as_str();
        while let Some(pos) = rest.find('\n') {
            let line = &rest[..pos];
            let line = line.strip_suffix('\r').unwrap_or(line);
            lines.push(line.to_string());
            rest = &rest[pos + 1..];
        }
        self.partial = rest.to_string();
        lines
    }

    /// Emit the pending fragment as a final line, if any.
    ///
    /// Called when the read loop ends so a trailing unterminated line is not
    /// lost.
    pub fn flush(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.partial))
    }

    /// Text received since the last newline.
    pub fn pending(&self) -> &str {
        &self.partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_feed_changes_nothing() {
        let mut lines = LineReassembler::new();
        assert!(lines.feed("").is_empty());
        assert_eq!(lines.pending(), "");

        lines.feed("abc");
        assert!(lines.feed("").is_empty());
        assert_eq!(lines.pending(), "abc");
    }

    #[test]
    fn test_no_newline_grows_fragment() {
        let mut lines = LineReassembler::new();
        assert!(lines.feed("hel").is_empty());
        assert!(lines.feed("lo").is_empty());
        assert_eq!(lines.pending(), "hello");
    }

    #[test]
    fn test_chunk_boundaries() {
        let mut lines = LineReassembler::new();
        let mut emitted = Vec::new();
        emitted.extend(lines.feed("abc"));
        emitted.extend(lines.feed("def\nghi\n"));
        emitted.extend(lines.feed("jkl"));

        assert_eq!(emitted, vec!["abcdef".to_string(), "ghi".to_string()]);
        assert_eq!(emitted.concat(), "abcdefghi");
        assert_eq!(lines.pending(), "jkl");
        assert_eq!(lines.flush(), Some("jkl".to_string()));
        assert_eq!(lines.pending(), "");
    }

    #[test]
    fn test_crlf_and_lf_both_terminate() {
        let mut lines = LineReassembler::new();
        let emitted = lines.feed("one\r\ntwo\nthree\r\n");
        assert_eq!(emitted, vec!["one", "two", "three"]);
        assert_eq!(lines.pending(), "");
    }

    #[test]
    fn test_lone_cr_is_not_a_terminator() {
        let mut lines = LineReassembler::new();
        let emitted = lines.feed("a\rb\nc");
        assert_eq!(emitted, vec!["a\rb"]);
        assert_eq!(lines.pending(), "c");
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut lines = LineReassembler::new();
        assert!(lines.feed("boot\r").is_empty());
        let emitted = lines.feed("\nready");
        assert_eq!(emitted, vec!["boot"]);
        assert_eq!(lines.pending(), "ready");
    }

    #[test]
    fn test_flush_when_empty() {
        let mut lines = LineReassembler::new();
        assert_eq!(lines.flush(), None);
        lines.feed("x\n");
        assert_eq!(lines.flush(), None);
    }

    #[test]
    fn test_empty_lines_are_preserved() {
        let mut lines = LineReassembler::new();
        let emitted = lines.feed("\n\nend\n");
        assert_eq!(emitted, vec!["", "", "end"]);
    }

    /// Reference split used by the reconstruction property.
    fn reference_split(input: &str) -> (Vec<String>, String) {
        let mut parts: Vec<String> = input.split('\n').map(str::to_string).collect();
        let pending = parts.pop().unwrap_or_default();
        let lines = parts
            .into_iter()
            .map(|line| line.strip_suffix('\r').unwrap_or(&line).to_string())
            .collect();
        (lines, pending)
    }

    proptest! {
        #[test]
        fn prop_reconstruction_matches_reference(
            chunks in proptest::collection::vec("[a-z\r\n]{0,12}", 0..8)
        ) {
            let mut reassembler = LineReassembler::new();
            let mut emitted = Vec::new();
            for chunk in &chunks {
                emitted.extend(reassembler.feed(chunk));
            }

            let input: String = chunks.concat();
            let (expected_lines, expected_pending) = reference_split(&input);

            prop_assert_eq!(&emitted, &expected_lines);
            prop_assert_eq!(reassembler.pending(), expected_pending.as_str());
            for line in &emitted {
                prop_assert!(!line.contains('\n'));
                prop_assert!(!line.ends_with('\r'));
            }
        }
    }
}
