// ABOUTME: Splits raw terminal output into text frames without breaking UTF-8 sequences
// ABOUTME: Falls back to binary frames for output that is not valid UTF-8

use tracing::trace;

/// Largest UTF-8 sequence; a pending tail never exceeds this
const MAX_UTF8_TAIL: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Carries an incomplete trailing UTF-8 sequence over to the next chunk
#[derive(Debug, Default)]
pub struct TextFramer {
    pending: Vec<u8>,
}

impl TextFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame one chunk of output; `None` when everything is held back
    pub fn push(&mut self, chunk: &[u8]) -> Option<Frame> {
        self.pending.extend_from_slice(chunk);

        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let frame = Frame::Text(text.to_string());
                self.pending.clear();
                Some(frame)
            }
            Err(e) if is_split_tail(&e, self.pending.len()) => {
                let tail = self.pending.split_off(e.valid_up_to());
                let head = std::mem::replace(&mut self.pending, tail);
                trace!(
                    "Holding back {} byte(s) of a split sequence",
                    self.pending.len()
                );
                if head.is_empty() {
                    return None;
                }
                // `head` is exactly the validated prefix
                Some(match String::from_utf8(head) {
                    Ok(text) => Frame::Text(text),
                    Err(e) => Frame::Binary(e.into_bytes()),
                })
            }
            Err(_) => Some(Frame::Binary(std::mem::take(&mut self.pending))),
        }
    }

    /// Emit whatever is still pending
    pub fn flush(&mut self) -> Option<Frame> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(match String::from_utf8(rest) {
            Ok(text) => Frame::Text(text),
            Err(e) => Frame::Binary(e.into_bytes()),
        })
    }
}

/// True when the only problem is an incomplete sequence at the very end
fn is_split_tail(err: &std::str::Utf8Error, len: usize) -> bool {
    err.error_len().is_none() && len - err.valid_up_to() < MAX_UTF8_TAIL
}
