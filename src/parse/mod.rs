//! Streaming parser for broadcast list files
//!
//! A list is one JSON object whose record key (`"X"`) repeats once per
//! entry. The object is walked key by key through serde's [`MapAccess`],
//! so only the record being decoded is ever held in memory. Decoded
//! records are grouped into batches and pushed to a [`BatchSink`].

use crate::media::{decode, Carry, MediaRecord};
use serde::de::{self, Deserializer as _, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use std::fmt;
use std::io::{BufReader, Read};
use std::ops::ControlFlow;
use thiserror::Error;
use tracing::debug;

/// Key under which every record is stored
pub const RECORD_KEY: &str = "X";

/// Key of the list metadata entry
pub const HEADER_KEY: &str = "Filmliste";

const CANCELLED: &str = "parse stopped by sink";

/// Errors that end a parse
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed list: {0}")]
    Syntax(#[source] serde_json::Error),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse cancelled")]
    Cancelled,
}

impl ParseError {
    fn from_json(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Io => ParseError::Io(err.into()),
            Category::Syntax | Category::Data | Category::Eof => ParseError::Syntax(err),
        }
    }
}

/// List-level metadata from the first `"Filmliste"` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListHeader {
    pub created_at: String,
    pub created_at_utc: String,
    pub version: String,
    pub generator: String,
    pub list_id: String,
}

impl ListHeader {
    fn from_values(values: Vec<serde_json::Value>) -> Self {
        let mut fields = values.into_iter().map(|value| match value {
            serde_json::Value::String(text) => text,
            _ => String::new(),
        });
        let mut next = || fields.next().unwrap_or_default();
        Self {
            created_at: next(),
            created_at_utc: next(),
            version: next(),
            generator: next(),
            list_id: next(),
        }
    }
}

/// Receiver of parse results.
///
/// Batches arrive in input order with strictly increasing cumulative
/// counts. Exactly one of `on_complete` / `on_error` is called, last.
pub trait BatchSink {
    fn on_header(&mut self, _header: ListHeader) {}

    /// Returning `ControlFlow::Break` stops the parse; it then ends with
    /// `on_error(ParseError::Cancelled, ..)`.
    fn on_batch(&mut self, records: Vec<MediaRecord>, cumulative: usize) -> ControlFlow<()>;

    fn on_complete(&mut self, total: usize);

    fn on_error(&mut self, error: ParseError, decoded: usize);
}

/// Streaming list parser
#[derive(Debug, Clone, Copy)]
pub struct ListParser {
    batch_size: usize,
}

impl ListParser {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Parse a whole list, reporting everything through `sink`
    pub fn parse<R: Read, S: BatchSink>(&self, reader: R, sink: &mut S) {
        let mut state = ParseState::new(self.batch_size);

        match read_list(BufReader::new(reader), &mut state, sink) {
            Ok(()) => state.finish(sink),
            Err(err) => {
                debug!(decoded = state.decoded, error = %err, "List parse ended with error");
                sink.on_error(err, state.decoded);
            }
        }
    }
}

struct ParseState {
    carry: Carry,
    batch: Vec<MediaRecord>,
    batch_size: usize,
    decoded: usize,
    header_seen: bool,
    stopped: bool,
}

impl ParseState {
    fn new(batch_size: usize) -> Self {
        Self {
            carry: Carry::new(),
            batch: Vec::with_capacity(batch_size),
            batch_size,
            decoded: 0,
            header_seen: false,
            stopped: false,
        }
    }

    fn push<S: BatchSink>(&mut self, record: MediaRecord, sink: &mut S) -> ControlFlow<()> {
        self.batch.push(record);
        self.decoded += 1;
        if self.batch.len() >= self.batch_size {
            self.flush(sink)
        } else {
            ControlFlow::Continue(())
        }
    }

    fn flush<S: BatchSink>(&mut self, sink: &mut S) -> ControlFlow<()> {
        let records = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
        let flow = sink.on_batch(records, self.decoded);
        if flow.is_break() {
            self.stopped = true;
        }
        flow
    }

    fn finish<S: BatchSink>(mut self, sink: &mut S) {
        if !self.batch.is_empty() && self.flush(sink).is_break() {
            sink.on_error(ParseError::Cancelled, self.decoded);
            return;
        }
        sink.on_complete(self.decoded);
    }
}

fn read_list<R: Read, S: BatchSink>(
    reader: R,
    state: &mut ParseState,
    sink: &mut S,
) -> Result<(), ParseError> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    let result = (&mut de)
        .deserialize_map(ListVisitor {
            state: &mut *state,
            sink,
        })
        .and_then(|()| de.end());

    result.map_err(|err| {
        if state.stopped {
            ParseError::Cancelled
        } else {
            ParseError::from_json(err)
        }
    })
}

struct ListVisitor<'a, S> {
    state: &'a mut ParseState,
    sink: &'a mut S,
}

impl<'de, S: BatchSink> Visitor<'de> for ListVisitor<'_, S> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a broadcast list object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                RECORD_KEY => {
                    let fields: RawFields = map.next_value()?;
                    let record = decode(&fields.0, &mut self.state.carry);
                    if self.state.push(record, &mut *self.sink).is_break() {
                        return Err(de::Error::custom(CANCELLED));
                    }
                }
                HEADER_KEY if !self.state.header_seen => {
                    // Metadata only: an unexpected shape is skipped, never fatal
                    let value: serde_json::Value = map.next_value()?;
                    self.state.header_seen = true;
                    match value {
                        serde_json::Value::Array(items) => {
                            self.sink.on_header(ListHeader::from_values(items));
                        }
                        other => debug!(kind = json_kind(&other), "Ignoring list header"),
                    }
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A record array, with non-string elements read as empty strings
struct RawFields(Vec<String>);

impl<'de> Deserialize<'de> for RawFields {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(RawFieldsVisitor)
    }
}

struct RawFieldsVisitor;

impl<'de> Visitor<'de> for RawFieldsVisitor {
    type Value = RawFields;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of record fields")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawFields, A::Error> {
        let mut fields = Vec::with_capacity(seq.size_hint().unwrap_or(24));
        while let Some(LenientString(value)) = seq.next_element()? {
            fields.push(value);
        }
        Ok(RawFields(fields))
    }
}

struct LenientString(String);

impl<'de> Deserialize<'de> for LenientString {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientStringVisitor)
    }
}

struct LenientStringVisitor;

impl<'de> Visitor<'de> for LenientStringVisitor {
    type Value = LenientString;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a record field")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<LenientString, E> {
        Ok(LenientString(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<LenientString, E> {
        Ok(LenientString(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<LenientString, E> {
        Ok(LenientString(String::new()))
    }

    fn visit_none<E: de::Error>(self) -> Result<LenientString, E> {
        Ok(LenientString(String::new()))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<LenientString, E> {
        Ok(LenientString(String::new()))
    }

    fn visit_i64<E: de::Error>(self, _v: i64) -> Result<LenientString, E> {
        Ok(LenientString(String::new()))
    }

    fn visit_u64<E: de::Error>(self, _v: u64) -> Result<LenientString, E> {
        Ok(LenientString(String::new()))
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<LenientString, E> {
        Ok(LenientString(String::new()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<LenientString, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(LenientString(String::new()))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<LenientString, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(LenientString(String::new()))
    }
}
