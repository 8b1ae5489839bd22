//! Streaming UTF-8 decoding for transport reads.
//!
//! Reads arrive on arbitrary byte boundaries, so a multi-byte sequence can be
//! split across chunks. The decoder carries the incomplete tail into the next
//! call instead of emitting replacement characters for it.

/// Incremental UTF-8 decoder with carry-over between chunks.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self { carry: Vec::new() }
    }

    /// Decode a chunk of bytes, returning all text that is complete so far.
    ///
    /// Invalid sequences decode to U+FFFD; an incomplete trailing sequence is
    /// held back until the next call.
    pub fn decode(&mut self, input: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(input);

        let mut out = String::with_capacity(data.len());
        let mut rest = data.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid_to = err.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid_to]).unwrap_or_default());
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid_to + bad..];
                        }
                        None => {
                            // Sequence may complete in the next chunk.
                            self.carry = rest[valid_to..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Surface any carried bytes at end of stream as replacement text.
    pub fn flush(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        self.carry.clear();
        Some(char::REPLACEMENT_CHARACTER.to_string())
    }
}
