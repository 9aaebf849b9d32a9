use anyhow::anyhow;

/// Splits a byte stream into text lines.
///
/// Bytes are held until a full line is available, so chunk boundaries that
/// fall inside a multibyte code point never corrupt the text.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<anyhow::Result<String>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            out.push(decode_line(line));
        }

        out
    }

    /// Flush a trailing line that was never terminated.
    pub fn finish(&mut self) -> Option<anyhow::Result<String>> {
        if self.buf.is_empty() {
            return None;
        }
        Some(decode_line(std::mem::take(&mut self.buf)))
    }
}

fn decode_line(mut line: Vec<u8>) -> anyhow::Result<String> {
    if line.ends_with(b"\n") {
        line.pop();
    }
    if line.ends_with(b"\r") {
        line.pop();
    }
    String::from_utf8(line).map_err(|e| anyhow!(e).context("stream line is not valid UTF-8"))
}

/// Payload of a `data:` field, if the line is one.
pub fn data_field(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    // Optional single leading space.
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Other,
}

/// Minimal SSE parser.
///
/// - Collects UTF-8 lines
/// - Emits Data events when a blank line ends an event
#[derive(Debug, Default)]
pub struct SseParser {
    lines: LineDecoder,
    cur_data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<anyhow::Result<SseEvent>> {
        let mut out = Vec::new();

        for line in self.lines.push(chunk) {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    out.push(Err(e));
                    continue;
                }
            };

            if line.is_empty() {
                if !self.cur_data.is_empty() {
                    if self.cur_data.ends_with('\n') {
                        self.cur_data.pop();
                    }
                    out.push(Ok(SseEvent::Data(std::mem::take(&mut self.cur_data))));
                }
                continue;
            }

            if let Some(rest) = data_field(&line) {
                self.cur_data.push_str(rest);
                self.cur_data.push('\n');
            } else {
                // event:, id:, retry:, comments
                out.push(Ok(SseEvent::Other));
            }
        }

        out
    }
}
