use std::io::Read;

use crate::config::IngestLimits;
use crate::error::{IngestRecord, IngestRecordError};
use crate::record_parser::{ClassifiedParserError, RecordParser};
use crate::reader::{BoundedLine, SyncBoundedLineReader};

fn strip_carriage_return(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn line_is_blank(line: &str) -> bool {
    line.chars().all(|ch| ch.is_whitespace())
}

/// Drives a bounded reader and a [`RecordParser`], yielding one
/// [`IngestRecord`] per non-blank line. Blank lines and `Ok(None)` parser
/// outcomes are consumed silently.
pub struct RecordIngestor<R: Read, P: RecordParser> {
    reader: SyncBoundedLineReader<R>,
    parser: P,
}

impl<R: Read, P: RecordParser> RecordIngestor<R, P> {
    pub fn new(reader: R, parser: P, limits: IngestLimits) -> Self {
        Self {
            reader: SyncBoundedLineReader::new(reader, limits.max_line_bytes),
            parser,
        }
    }

    pub fn into_parser(self) -> P {
        self.parser
    }

    fn error_record<T>(line_number: usize, err: IngestRecordError) -> IngestRecord<T> {
        IngestRecord {
            line_number,
            outcome: Err(err),
        }
    }
}

impl<R: Read, P: RecordParser> Iterator for RecordIngestor<R, P> {
    type Item = IngestRecord<P::Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.next()? {
                BoundedLine::IoError { line_number } => {
                    return Some(Self::error_record(line_number, IngestRecordError::Io));
                }
                BoundedLine::LineTooLong {
                    line_number,
                    observed_bytes,
                    max_line_bytes,
                } => {
                    return Some(Self::error_record(
                        line_number,
                        IngestRecordError::LineTooLong {
                            observed_bytes,
                            max_line_bytes,
                        },
                    ));
                }
                BoundedLine::Line { line_number, bytes } => {
                    let Ok(raw) = String::from_utf8(bytes) else {
                        return Some(Self::error_record(
                            line_number,
                            IngestRecordError::InvalidUtf8,
                        ));
                    };
                    let line = strip_carriage_return(&raw);
                    if line_is_blank(line) {
                        continue;
                    }

                    match self.parser.parse_line(line) {
                        Ok(None) => continue,
                        Ok(Some(record)) => {
                            return Some(IngestRecord {
                                line_number,
                                outcome: Ok(record),
                            });
                        }
                        Err(err) => {
                            return Some(Self::error_record(
                                line_number,
                                IngestRecordError::Parse {
                                    code: err.code(),
                                    summary: err.summary(),
                                },
                            ));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(feature = "tokio")]
mod tokio_ingest {
    use tokio::io::AsyncRead;

    use crate::config::IngestLimits;
    use crate::error::{IngestRecord, IngestRecordError};
    use crate::record_parser::{ClassifiedParserError, RecordParser};
    use crate::reader::{AsyncBoundedLineReader, AsyncBoundedLineResult};

    pub struct AsyncRecordIngestor<R: AsyncRead + Unpin, P: RecordParser> {
        reader: AsyncBoundedLineReader<R>,
        parser: P,
    }

    impl<R: AsyncRead + Unpin, P: RecordParser> AsyncRecordIngestor<R, P> {
        pub fn new(reader: R, parser: P, limits: IngestLimits) -> Self {
            Self {
                reader: AsyncBoundedLineReader::new(reader, limits.max_line_bytes),
                parser,
            }
        }

        pub fn into_parser(self) -> P {
            self.parser
        }

        fn error_record<T>(line_number: usize, err: IngestRecordError) -> IngestRecord<T> {
            IngestRecord {
                line_number,
                outcome: Err(err),
            }
        }

        pub async fn next_record(&mut self) -> Option<IngestRecord<P::Record>> {
            loop {
                match self.reader.next_line().await? {
                    AsyncBoundedLineResult::IoError { line_number } => {
                        return Some(Self::error_record(line_number, IngestRecordError::Io));
                    }
                    AsyncBoundedLineResult::LineTooLong {
                        line_number,
                        observed_bytes,
                        max_line_bytes,
                    } => {
                        return Some(Self::error_record(
                            line_number,
                            IngestRecordError::LineTooLong {
                                observed_bytes,
                                max_line_bytes,
                            },
                        ));
                    }
                    AsyncBoundedLineResult::Line { line_number, bytes } => {
                        let Ok(raw) = String::from_utf8(bytes) else {
                            return Some(Self::error_record(
                                line_number,
                                IngestRecordError::InvalidUtf8,
                            ));
                        };
                        let line = super::strip_carriage_return(&raw);
                        if super::line_is_blank(line) {
                            continue;
                        }

                        match self.parser.parse_line(line) {
                            Ok(None) => continue,
                            Ok(Some(record)) => {
                                return Some(IngestRecord {
                                    line_number,
                                    outcome: Ok(record),
                                });
                            }
                            Err(err) => {
                                return Some(Self::error_record(
                                    line_number,
                                    IngestRecordError::Parse {
                                        code: err.code(),
                                        summary: err.summary(),
                                    },
                                ));
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(feature = "tokio")]
pub use tokio_ingest::AsyncRecordIngestor;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParserErrorCode;

    #[derive(Default)]
    struct EchoParser;

    #[derive(Debug, thiserror::Error)]
    #[error("unparseable record")]
    struct EchoError;

    impl ClassifiedParserError for EchoError {
        fn code(&self) -> ParserErrorCode {
            ParserErrorCode::Unknown
        }

        fn summary(&self) -> String {
            "unparseable record".to_string()
        }
    }

    impl RecordParser for EchoParser {
        type Record = String;
        type Error = EchoError;

        fn reset(&mut self) {}

        fn parse_line(&mut self, line: &str) -> Result<Option<Self::Record>, Self::Error> {
            if line.starts_with('!') {
                return Err(EchoError);
            }
            Ok(Some(line.to_string()))
        }
    }

    #[test]
    fn skips_blank_lines_and_strips_carriage_returns() {
        let data = b"first\r\n\n   \nsecond\n";
        let records: Vec<_> =
            RecordIngestor::new(std::io::Cursor::new(data), EchoParser, IngestLimits::default())
                .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outcome.as_deref().unwrap(), "first");
        assert_eq!(records[0].line_number, 1);
        assert_eq!(records[1].outcome.as_deref().unwrap(), "second");
        assert_eq!(records[1].line_number, 4);
    }

    #[test]
    fn parser_failures_surface_as_typed_records() {
        let data = b"!bad\ngood\n";
        let records: Vec<_> =
            RecordIngestor::new(std::io::Cursor::new(data), EchoParser, IngestLimits::default())
                .collect();

        assert!(matches!(
            records[0].outcome,
            Err(IngestRecordError::Parse { .. })
        ));
        assert!(records[1].outcome.is_ok());
    }
}
