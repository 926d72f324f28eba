#![forbid(unsafe_code)]
//! Bounded, line-oriented ingestion for EVE JSON sensor streams.
//!
//! Upstream sensors (Suricata, Sagan) emit one JSON object per line. This
//! crate owns the framing layer only:
//! - A bounded-memory line reader (sync + optional tokio). Overlong lines
//!   are discarded in streaming fashion and surfaced as a typed record;
//!   iteration continues with the next line.
//! - A [`RecordParser`] seam so the decode stage plugs in without this
//!   crate knowing anything about event semantics.
//! - A per-line outcome type ([`IngestRecord`]) that never raises to the
//!   caller: I/O trouble, invalid UTF-8, oversize, and parse failures all
//!   arrive as values.

mod config;
mod error;
mod ingest;
mod record_parser;
mod reader;

pub use config::IngestLimits;
pub use error::{IngestRecord, IngestRecordError, ParserErrorCode};
pub use ingest::RecordIngestor;
pub use record_parser::{ClassifiedParserError, RecordParser};
pub use reader::{BoundedLine, SyncBoundedLineReader};

#[cfg(feature = "tokio")]
pub use ingest::AsyncRecordIngestor;

#[cfg(feature = "tokio")]
pub use reader::{AsyncBoundedLineReader, AsyncBoundedLineResult};
