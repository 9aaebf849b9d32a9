use crate::frame::Frame;
use crate::sse::{data_field, LineDecoder};

/// One decoded `data:` line.
#[derive(Debug)]
pub enum Decoded {
    Frame(Frame),
    /// The payload could not be decoded; the caller drops it.
    Malformed { payload: String, error: String },
}

/// Incremental decoder for the relay's event stream.
///
/// Every `data:` line is one payload. Other lines (blank separators,
/// comments, `event:` fields) are skipped.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    lines: LineDecoder,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Decoded> {
        self.lines
            .push(chunk)
            .into_iter()
            .filter_map(decode_line)
            .collect()
    }

    /// Decode whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<Decoded> {
        self.lines.finish().and_then(decode_line).into_iter().collect()
    }
}

fn decode_line(line: anyhow::Result<String>) -> Option<Decoded> {
    let line = match line {
        Ok(l) => l,
        Err(e) => {
            return Some(Decoded::Malformed {
                payload: String::new(),
                error: format!("{e:#}"),
            })
        }
    };
    let payload = data_field(&line)?;
    Some(match Frame::parse(payload) {
        Ok(frame) => Decoded::Frame(frame),
        Err(e) => Decoded::Malformed {
            payload: payload.to_string(),
            error: e.to_string(),
        },
    })
}
