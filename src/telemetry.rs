use std::io::Write;

use serde_json::{Map, Value};

/// Fire-and-forget key/value publisher
///
/// Publishing never fails from the caller's point of view; a sink that cannot
/// deliver logs the problem and carries on.
pub trait TelemetrySink {
    fn publish(&mut self, key: &str, value: f64);

    /// Called once after every key of a decision has been published.
    fn flush(&mut self) {}
}

/// Writes every value to the log at info level
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn publish(&mut self, key: &str, value: f64) {
        log::info!("{} = {}", key, value);
    }
}

/// One JSON object per decision, one decision per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
    pending: Map<String, Value>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: Map::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TelemetrySink for JsonLinesSink<W> {
    fn publish(&mut self, key: &str, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        self.pending.insert(key.to_string(), value);
    }

    fn flush(&mut self) {
        let line = Value::Object(std::mem::take(&mut self.pending));
        let result = serde_json::to_writer(&mut self.writer, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush());
        if let Err(e) = result {
            log::warn!("Failed to write telemetry: {}", e);
        }
    }
}

/// Keeps everything published, for tests and offline runs
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    entries: Vec<(String, f64)>,
    flushes: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    /// Most recent value published under `key`
    pub fn latest(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    /// Number of completed decisions
    pub fn decisions(&self) -> usize {
        self.flushes
    }
}

impl TelemetrySink for RecordingSink {
    fn publish(&mut self, key: &str, value: f64) {
        self.entries.push((key.to_string(), value));
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
