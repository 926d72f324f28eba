use thiserror::Error;

/// Coarse classification of parse failures, suitable for counters.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ParserErrorCode {
    JsonParse,
    MissingEventType,
    Unknown,
}

#[derive(Debug, Error, Clone)]
pub enum IngestRecordError {
    #[error("I/O error while reading event stream")]
    Io,
    #[error("invalid UTF-8 in event stream")]
    InvalidUtf8,
    #[error("line too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})")]
    LineTooLong {
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    #[error("parse failure ({code:?}): {summary}")]
    Parse {
        code: ParserErrorCode,
        summary: String,
    },
}

/// One line's worth of outcome. The ingestor never raises; every line is
/// either a record or a typed error carried by value.
#[derive(Debug, Clone)]
pub struct IngestRecord<T> {
    pub line_number: usize,
    pub outcome: Result<T, IngestRecordError>,
}
