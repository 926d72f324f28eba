use std::io::Write;

use thiserror::Error;

use crate::alert::AlertRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("sink rejected record: {0}")]
    Rejected(String),
}

/// Relational sink; receives decoded alerts only.
pub trait SqlSink {
    fn insert_alert(&mut self, alert: &AlertRecord) -> Result<(), SinkError>;
}

/// Key/value store used as an event bus: one named stream per event class.
pub trait StreamSink {
    fn publish(&mut self, stream: &str, line: &str) -> Result<(), SinkError>;
}

/// Search/indexing cluster. `doc_id` is set for content-addressed
/// documents (NDP observations) and absent for plain event indexing.
pub trait SearchSink {
    fn index(&mut self, index: &str, doc_id: Option<&str>, document: &str) -> Result<(), SinkError>;
}

/// Pipes and flat files: one line per event.
pub trait LineSink {
    fn write_line(&mut self, line: &str) -> Result<(), SinkError>;
}

/// External command invoked per alert.
pub trait CommandSink {
    fn execute(&mut self, line: &str) -> Result<(), SinkError>;
}

/// Dedicated consumer for sensor `stats` events.
pub trait StatsSink {
    fn record_stats(&mut self, line: &str) -> Result<(), SinkError>;
}

/// Runtime registry of sink handles. Optional sinks register themselves at
/// startup; an absent handle simply reads as disabled, whatever the
/// enablement matrix says.
#[derive(Default)]
pub struct SinkRegistry {
    pub sql: Option<Box<dyn SqlSink>>,
    pub stream: Option<Box<dyn StreamSink>>,
    pub search: Option<Box<dyn SearchSink>>,
    pub pipe: Option<Box<dyn LineSink>>,
    pub file: Option<Box<dyn LineSink>>,
    pub external: Option<Box<dyn CommandSink>>,
    pub stats: Option<Box<dyn StatsSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Line sink over any writer; serves the file and pipe roles.
pub struct WriterLineSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterLineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LineSink for WriterLineSink<W> {
    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

pub mod memory {
    //! In-process sinks that record everything they are handed. Reference
    //! behaviour for the delivery contracts and the backbone of the test
    //! suites.

    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    pub struct MemorySqlSink {
        rows: Arc<Mutex<Vec<AlertRecord>>>,
    }

    impl MemorySqlSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn rows(&self) -> Vec<AlertRecord> {
            self.rows.lock().expect("sql sink poisoned").clone()
        }
    }

    impl SqlSink for MemorySqlSink {
        fn insert_alert(&mut self, alert: &AlertRecord) -> Result<(), SinkError> {
            self.rows.lock().expect("sql sink poisoned").push(alert.clone());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    pub struct MemoryStreamSink {
        published: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl MemoryStreamSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn published(&self) -> Vec<(String, String)> {
            self.published.lock().expect("stream sink poisoned").clone()
        }
    }

    impl StreamSink for MemoryStreamSink {
        fn publish(&mut self, stream: &str, line: &str) -> Result<(), SinkError> {
            self.published
                .lock()
                .expect("stream sink poisoned")
                .push((stream.to_string(), line.to_string()));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    pub struct MemorySearchSink {
        documents: Arc<Mutex<Vec<(String, Option<String>, String)>>>,
    }

    impl MemorySearchSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn documents(&self) -> Vec<(String, Option<String>, String)> {
            self.documents.lock().expect("search sink poisoned").clone()
        }

        pub fn documents_in(&self, index: &str) -> Vec<(Option<String>, String)> {
            self.documents
                .lock()
                .expect("search sink poisoned")
                .iter()
                .filter(|(i, _, _)| i == index)
                .map(|(_, id, doc)| (id.clone(), doc.clone()))
                .collect()
        }
    }

    impl SearchSink for MemorySearchSink {
        fn index(
            &mut self,
            index: &str,
            doc_id: Option<&str>,
            document: &str,
        ) -> Result<(), SinkError> {
            self.documents.lock().expect("search sink poisoned").push((
                index.to_string(),
                doc_id.map(str::to_string),
                document.to_string(),
            ));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    pub struct MemoryLineSink {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl MemoryLineSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().expect("line sink poisoned").clone()
        }
    }

    impl LineSink for MemoryLineSink {
        fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
            self.lines
                .lock()
                .expect("line sink poisoned")
                .push(line.to_string());
            Ok(())
        }
    }

    impl CommandSink for MemoryLineSink {
        fn execute(&mut self, line: &str) -> Result<(), SinkError> {
            self.write_line(line)
        }
    }

    impl StatsSink for MemoryLineSink {
        fn record_stats(&mut self, line: &str) -> Result<(), SinkError> {
            self.write_line(line)
        }
    }

    /// A sink that always fails; for exercising best-effort delivery.
    pub struct FailingSink;

    impl SqlSink for FailingSink {
        fn insert_alert(&mut self, _alert: &AlertRecord) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("sql connection lost".to_string()))
        }
    }

    impl LineSink for FailingSink {
        fn write_line(&mut self, _line: &str) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("pipe closed".to_string()))
        }
    }

    impl SearchSink for FailingSink {
        fn index(
            &mut self,
            _index: &str,
            _doc_id: Option<&str>,
            _document: &str,
        ) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("cluster unreachable".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_sink_appends_newline_per_event() {
        let mut sink = WriterLineSink::new(Vec::new());
        sink.write_line("{\"event_type\":\"alert\"}").unwrap();
        sink.write_line("{\"event_type\":\"dns\"}").unwrap();

        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
