use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK_BYTES: usize = 8192;

#[derive(Debug)]
pub enum AsyncBoundedLineResult {
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

/// Async twin of [`super::SyncBoundedLineReader`]; same framing contract.
pub struct AsyncBoundedLineReader<R: AsyncRead + Unpin> {
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

impl<R: AsyncRead + Unpin> AsyncBoundedLineReader<R> {
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

    async fn refill(&mut self) -> Result<usize, ()> {
        self.chunk_pos = 0;
        match self.source.read(&mut self.chunk).await {
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

    fn complete_line(&mut self) -> AsyncBoundedLineResult {
        self.lines_emitted += 1;
        let line_number = self.lines_emitted;

        let out = if self.discarding {
            AsyncBoundedLineResult::LineTooLong {
                line_number,
                observed_bytes: self.line_bytes_seen,
                max_line_bytes: self.max_line_bytes,
            }
        } else {
            AsyncBoundedLineResult::Line {
                line_number,
                bytes: std::mem::take(&mut self.line),
            }
        };

        self.line.clear();
        self.line_bytes_seen = 0;
        self.discarding = false;
        out
    }

    pub async fn next_line(&mut self) -> Option<AsyncBoundedLineResult> {
        if self.eof {
            return None;
        }

        loop {
            if self.chunk_pos >= self.chunk_len {
                match self.refill().await {
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
                        return Some(AsyncBoundedLineResult::IoError {
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

    #[tokio::test]
    async fn frames_and_bounds_lines() {
        let mut data = Vec::new();
        data.extend_from_slice(b"{\"event_type\":\"ssh\"}\n");
        data.extend_from_slice(&vec![b'y'; 40]);
        data.extend_from_slice(b"\n");

        let mut reader = AsyncBoundedLineReader::new(std::io::Cursor::new(data), 24);

        assert!(matches!(
            reader.next_line().await,
            Some(AsyncBoundedLineResult::Line { .. })
        ));
        assert!(matches!(
            reader.next_line().await,
            Some(AsyncBoundedLineResult::LineTooLong { .. })
        ));
        assert!(reader.next_line().await.is_none());
    }
}
