//! Internal events for sleet metrics emission.
//!
//! Each event struct represents a measurable occurrence during ingestion or
//! querying. The `target` label carries the table name so several runners
//! in one process stay distinguishable.

use std::time::Duration;

use ::metrics::{counter, histogram};
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Records decoded from the input stream by the decode stage.
pub struct RecordsDecoded {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for RecordsDecoded {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Records decoded");
        counter!("sleet_records_decoded_total", "target" => self.target).increment(self.count);
    }
}

/// Rows inserted by a committed load transaction.
pub struct RecordsLoaded {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for RecordsLoaded {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Records loaded");
        counter!("sleet_records_loaded_total", "target" => self.target).increment(self.count);
    }
}

/// Columns added to the table by a committed load transaction.
pub struct ColumnsAdded {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for ColumnsAdded {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Columns added");
        counter!("sleet_columns_added_total", "target" => self.target).increment(self.count);
    }
}

/// An ingestion run committed.
pub struct IngestionCompleted {
    pub duration: Duration,
    pub target: String,
}

impl InternalEvent for IngestionCompleted {
    fn emit(self) {
        trace!(
            duration_secs = self.duration.as_secs_f64(),
            target = %self.target,
            "Ingestion completed"
        );
        counter!("sleet_ingestions_total", "status" => "success", "target" => self.target.clone())
            .increment(1);
        histogram!("sleet_ingestion_duration_seconds", "target" => self.target)
            .record(self.duration.as_secs_f64());
    }
}

/// Stage in which an ingestion run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Decode,
    Load,
    Cancelled,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Decode => "decode",
            IngestStage::Load => "load",
            IngestStage::Cancelled => "cancelled",
        }
    }
}

/// An ingestion run rolled back.
pub struct IngestionFailed {
    pub stage: IngestStage,
    pub target: String,
}

impl InternalEvent for IngestionFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), target = %self.target, "Ingestion failed");
        counter!(
            "sleet_ingestions_total",
            "status" => "failed",
            "stage" => self.stage.as_str(),
            "target" => self.target
        )
        .increment(1);
    }
}

/// A query returned rows.
pub struct QueryExecuted {
    pub rows: u64,
    pub duration: Duration,
}

impl InternalEvent for QueryExecuted {
    fn emit(self) {
        trace!(rows = self.rows, duration_secs = self.duration.as_secs_f64(), "Query executed");
        counter!("sleet_query_rows_total").increment(self.rows);
        histogram!("sleet_query_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// A query failed; `kind` distinguishes recoverable from fatal failures.
pub struct QueryFailed {
    pub kind: &'static str,
}

impl InternalEvent for QueryFailed {
    fn emit(self) {
        trace!(kind = self.kind, "Query failed");
        counter!("sleet_query_failures_total", "kind" => self.kind).increment(1);
    }
}
