// Newline framing for stream transports.

/// One complete line pulled out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Bytes were not valid UTF-8; the line is dropped.
    InvalidUtf8,
    /// The line exceeded the size limit and was cut; its remainder is skipped.
    Oversized,
}

/// Accumulates partial reads until a `\n` completes a line.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_line: usize,
    // Set while discarding the tail of an oversized line.
    skipping: bool,
    keep_blank: bool,
}

impl LineBuffer {
    pub fn new(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line,
            skipping: false,
            keep_blank: false,
        }
    }

    /// Report blank lines as empty text instead of dropping them.
    pub fn with_blank_lines(mut self) -> Self {
        self.keep_blank = true;
        self
    }

    /// Bytes held for the current, still incomplete, line.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Feeds one read's worth of bytes; returns every line it completed.
    ///
    /// A trailing `\r` is dropped, and so are blank lines unless
    /// [`with_blank_lines`](Self::with_blank_lines) was set. A zero-length chunk is fine.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while !rest.is_empty() {
            match rest.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    let (head, tail) = rest.split_at(pos);
                    rest = &tail[1..];
                    if self.skipping {
                        self.skipping = false;
                        continue;
                    }
                    if self.buf.len() + head.len() > self.max_line {
                        self.buf.clear();
                        lines.push(Line::Oversized);
                        continue;
                    }
                    self.buf.extend_from_slice(head);
                    if let Some(line) = self.take_line() {
                        lines.push(line);
                    }
                }
                None => {
                    if !self.skipping {
                        if self.buf.len() + rest.len() > self.max_line {
                            self.buf.clear();
                            self.skipping = true;
                            lines.push(Line::Oversized);
                        } else {
                            self.buf.extend_from_slice(rest);
                        }
                    }
                    rest = &[];
                }
            }
        }

        lines
    }

    fn take_line(&mut self) -> Option<Line> {
        let mut bytes = std::mem::take(&mut self.buf);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return self.keep_blank.then(|| Line::Text(String::new()));
        }
        Some(match String::from_utf8(bytes) {
            Ok(text) => Line::Text(text),
            Err(_) => Line::InvalidUtf8,
        })
    }
}
