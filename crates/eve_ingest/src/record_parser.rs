use std::error::Error;

use crate::error::ParserErrorCode;

pub trait RecordParser {
    type Record;
    type Error: ClassifiedParserError;

    fn reset(&mut self);

    /// `Ok(None)` means the line was consumed with nothing to surface.
    fn parse_line(&mut self, line: &str) -> Result<Option<Self::Record>, Self::Error>;
}

/// Parser errors carry a bounded summary. The summary must never embed the
/// whole raw line; callers that want context log their own bounded prefix.
pub trait ClassifiedParserError: Error {
    fn code(&self) -> ParserErrorCode;
    fn summary(&self) -> String;
}
