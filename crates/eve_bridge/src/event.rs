use serde_json::Value;
use thiserror::Error;

use eve_ingest::{ClassifiedParserError, ParserErrorCode, RecordParser};

/// How much of a bad input line is allowed into log output.
pub const WARN_PREFIX_BYTES: usize = 256;

/// Trim `input` to a log-safe prefix on a char boundary.
pub fn bounded_prefix(input: &str) -> &str {
    if input.len() <= WARN_PREFIX_BYTES {
        return input;
    }
    let mut end = WARN_PREFIX_BYTES;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("empty input line")]
    Empty,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("top-level value is not an object")]
    NotObject,
    #[error("event_type is missing or not a string")]
    MissingEventType,
}

/// One sensor record: the parsed tree, its `event_type`, and the raw line
/// it came from. The tree is parsed exactly once; every later stage reads
/// fields through the best-effort accessors here.
#[derive(Debug, Clone)]
pub struct Event {
    value: Value,
    event_type: String,
    raw: String,
}

impl Event {
    pub fn parse(line: &str) -> Result<Self, EventParseError> {
        if line.trim().is_empty() {
            return Err(EventParseError::Empty);
        }

        let value: Value = serde_json::from_str(line)?;
        if !value.is_object() {
            return Err(EventParseError::NotObject);
        }

        let event_type = match value.get("event_type") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(EventParseError::MissingEventType),
        };

        Ok(Self {
            value,
            event_type,
            raw: line.to_string(),
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Missing or wrongly-typed fields read as `""`, never as failures.
    pub fn str_field(&self, key: &str) -> &str {
        json_str(&self.value, key)
    }

    pub fn u64_field(&self, key: &str) -> u64 {
        json_u64(&self.value, key)
    }

    pub fn u16_field(&self, key: &str) -> u16 {
        json_u64(&self.value, key) as u16
    }

    pub fn bool_field(&self, key: &str) -> bool {
        json_bool(&self.value, key)
    }

    /// A nested protocol record. Sensors emit these either as native JSON
    /// subobjects or as re-serialised strings; both forms normalise to an
    /// object here, anything else is `None`.
    pub fn nested(&self, key: &str) -> Option<Value> {
        nested_object(&self.value, key)
    }

    pub fn src_ip(&self) -> &str {
        self.str_field("src_ip")
    }

    pub fn dest_ip(&self) -> &str {
        self.str_field("dest_ip")
    }

    pub fn src_port(&self) -> u16 {
        self.u16_field("src_port")
    }

    pub fn dest_port(&self) -> u16 {
        self.u16_field("dest_port")
    }

    pub fn proto(&self) -> &str {
        self.str_field("proto")
    }

    pub fn app_proto(&self) -> &str {
        self.str_field("app_proto")
    }

    pub fn timestamp(&self) -> &str {
        self.str_field("timestamp")
    }

    pub fn flow_id(&self) -> u64 {
        self.u64_field("flow_id")
    }

    pub fn host(&self) -> &str {
        self.str_field("host")
    }

    pub fn src_dns(&self) -> &str {
        self.str_field("src_dns")
    }

    pub fn dest_dns(&self) -> &str {
        self.str_field("dest_dns")
    }
}

pub(crate) fn json_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn json_u64(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

pub(crate) fn json_bool(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn nested_object(value: &Value, key: &str) -> Option<Value> {
    match value.get(key)? {
        obj @ Value::Object(_) => Some(obj.clone()),
        Value::String(s) => {
            let parsed: Value = serde_json::from_str(s).ok()?;
            parsed.is_object().then_some(parsed)
        }
        _ => None,
    }
}

/// Adapter so a [`Bridge`](crate::Bridge) can sit directly on an
/// `eve_ingest` reader loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct EveParser;

impl EveParser {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Error)]
#[error("{summary}")]
pub struct EveParserError {
    code: ParserErrorCode,
    summary: String,
}

impl ClassifiedParserError for EveParserError {
    fn code(&self) -> ParserErrorCode {
        self.code
    }

    fn summary(&self) -> String {
        self.summary.clone()
    }
}

impl RecordParser for EveParser {
    type Record = Event;
    type Error = EveParserError;

    fn reset(&mut self) {}

    fn parse_line(&mut self, line: &str) -> Result<Option<Self::Record>, Self::Error> {
        Event::parse(line).map(Some).map_err(|err| {
            let code = match &err {
                EventParseError::MissingEventType => ParserErrorCode::MissingEventType,
                _ => ParserErrorCode::JsonParse,
            };
            EveParserError {
                code,
                summary: err.to_string(),
            }
        })
    }
}
