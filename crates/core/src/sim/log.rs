//! Flight log sinks.
//!
//! One [`FlightRecord`] is handed to the sink per genuine step. Persistence and
//! plotting happen elsewhere; these sinks only collect or serialize the records.

use std::io::Write;

use super::frames::FlightRecord;
use crate::common::SinkError;

/// Consumer of per-step flight records.
pub trait TelemetrySink {
    /// Accepts one record.
    fn record(&mut self, record: &FlightRecord) -> Result<(), SinkError>;

    /// Pushes buffered records to their destination.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<FlightRecord>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in step order.
    pub fn records(&self) -> &[FlightRecord] {
        &self.records
    }

    /// Takes the records out.
    pub fn into_records(self) -> Vec<FlightRecord> {
        self.records
    }
}

impl TelemetrySink for MemorySink {
    fn record(&mut self, record: &FlightRecord) -> Result<(), SinkError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Writes each record as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wraps `writer`; wrap files in a `BufWriter`.
    pub const fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Records written so far.
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TelemetrySink for JsonLinesSink<W> {
    fn record(&mut self, record: &FlightRecord) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn record(&mut self, record: &FlightRecord) -> Result<(), SinkError> {
        (**self).record(record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}
