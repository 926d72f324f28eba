use std::io::Read;

const READ_CHUNK_BYTES: usize = 8192;

#[derive(Debug)]
pub enum BoundedLine {
    Line {
        line_number: usize,
        bytes: Vec<u8>,
    },
    LineTooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    IoError {
        line_number: usize,
    },
}

/// Newline framing with a hard per-line byte budget. Once a line exceeds
/// the budget its bytes are discarded as they stream past; the line still
/// surfaces (as `LineTooLong`) so callers can count it.
pub struct SyncBoundedLineReader<R: Read> {
    source: R,
    max_line_bytes: usize,
    chunk: [u8; READ_CHUNK_BYTES],
    chunk_pos: usize,
    chunk_len: usize,
    line: Vec<u8>,
    line_bytes_seen: usize,
    discarding: bool,
    lines_emitted: usize,
    eof: bool,
}

impl<R: Read> SyncBoundedLineReader<R> {
    pub fn new(source: R, max_line_bytes: usize) -> Self {
        Self {
            source,
            max_line_bytes,
            chunk: [0u8; READ_CHUNK_BYTES],
            chunk_pos: 0,
            chunk_len: 0,
            line: Vec::new(),
            line_bytes_seen: 0,
            discarding: false,
            lines_emitted: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> Result<usize, ()> {
        self.chunk_pos = 0;
        match self.source.read(&mut self.chunk) {
            Ok(n) => {
                self.chunk_len = n;
                Ok(n)
            }
            Err(_) => Err(()),
        }
    }

    fn accept(&mut self, from: usize, to: usize) {
        let span = to - from;
        self.line_bytes_seen = self.line_bytes_seen.saturating_add(span);
        if self.line_bytes_seen > self.max_line_bytes {
            self.discarding = true;
            self.line.clear();
            return;
        }
        self.line.extend_from_slice(&self.chunk[from..to]);
    }

    fn complete_line(&mut self) -> BoundedLine {
        self.lines_emitted += 1;
        let line_number = self.lines_emitted;

        let out = if self.discarding {
            BoundedLine::LineTooLong {
                line_number,
                observed_bytes: self.line_bytes_seen,
                max_line_bytes: self.max_line_bytes,
            }
        } else {
            BoundedLine::Line {
                line_number,
                bytes: std::mem::take(&mut self.line),
            }
        };

        self.line.clear();
        self.line_bytes_seen = 0;
        self.discarding = false;
        out
    }
}

impl<R: Read> Iterator for SyncBoundedLineReader<R> {
    type Item = BoundedLine;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof {
            return None;
        }

        loop {
            if self.chunk_pos >= self.chunk_len {
                match self.refill() {
                    Ok(0) => {
                        self.eof = true;
                        if self.discarding || !self.line.is_empty() {
                            return Some(self.complete_line());
                        }
                        return None;
                    }
                    Ok(_) => {}
                    Err(()) => {
                        self.eof = true;
                        self.lines_emitted += 1;
                        return Some(BoundedLine::IoError {
                            line_number: self.lines_emitted,
                        });
                    }
                }
            }

            let newline = self.chunk[self.chunk_pos..self.chunk_len]
                .iter()
                .position(|b| *b == b'\n');

            match newline {
                None => {
                    self.accept(self.chunk_pos, self.chunk_len);
                    self.chunk_pos = self.chunk_len;
                }
                Some(offset) => {
                    self.accept(self.chunk_pos, self.chunk_pos + offset);
                    self.chunk_pos = self.chunk_pos + offset + 1;
                    return Some(self.complete_line());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_lines_across_chunk_boundaries() {
        let data = b"{\"event_type\":\"flow\"}\n{\"event_type\":\"dns\"}\n";
        let lines: Vec<_> = SyncBoundedLineReader::new(std::io::Cursor::new(data), 1024).collect();

        assert_eq!(lines.len(), 2);
        match &lines[0] {
            BoundedLine::Line { line_number, bytes } => {
                assert_eq!(*line_number, 1);
                assert_eq!(bytes, b"{\"event_type\":\"flow\"}");
            }
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[test]
    fn oversized_line_is_discarded_and_iteration_continues() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"ok\n");
        bytes.extend_from_slice(&vec![b'x'; 50]);
        bytes.extend_from_slice(b"\nnext\n");

        let lines: Vec<_> = SyncBoundedLineReader::new(std::io::Cursor::new(bytes), 16).collect();

        assert!(matches!(lines[0], BoundedLine::Line { .. }));
        assert!(matches!(
            lines[1],
            BoundedLine::LineTooLong {
                observed_bytes: 50,
                max_line_bytes: 16,
                ..
            }
        ));
        assert!(matches!(lines[2], BoundedLine::Line { .. }));
    }

    #[test]
    fn final_unterminated_line_is_emitted() {
        let data = b"{\"event_type\":\"tls\"}";
        let lines: Vec<_> = SyncBoundedLineReader::new(std::io::Cursor::new(data), 1024).collect();

        assert_eq!(lines.len(), 1);
        assert!(matches!(lines[0], BoundedLine::Line { .. }));
    }
}
