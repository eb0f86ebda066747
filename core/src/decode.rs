//! Incremental UTF-8 decoding of a streamed response body.
//!
//! Chunks arrive at arbitrary byte boundaries, so a multi-byte character may
//! be split across two writes. The decoder holds back an incomplete trailing
//! sequence until the next chunk completes it. Invalid sequences decode to
//! U+FFFD rather than failing; whether the text is usable is decided later by
//! the JSON parser.
//!
//! One decoder belongs to exactly one response.

use std::borrow::Cow;
use std::mem;

#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
    text: String,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the body.
    pub fn write(&mut self, chunk: &[u8]) {
        let buf: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut joined = mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            Cow::Owned(joined)
        };

        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // `valid` is well-formed, so this never substitutes.
                    self.text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end of the chunk.
                            self.pending.extend_from_slice(after);
                            return;
                        }
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pending.is_empty()
    }

    /// Finish decoding. A sequence still incomplete at end of stream becomes
    /// a single replacement character.
    pub fn finish(mut self) -> String {
        if !self.pending.is_empty() {
            self.text.push(char::REPLACEMENT_CHARACTER);
        }
        self.text
    }
}
