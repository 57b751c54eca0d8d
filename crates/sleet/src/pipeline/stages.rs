//! Blocking bodies of the decode and load stages.

use std::io::Read;
use std::sync::Mutex;

use rusqlite::Connection;
use snafu::ResultExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{IngestError, TransactionSnafu};
use crate::schema::SchemaManager;
use crate::sink::{LoadSummary, Loader, existing_columns};
use crate::source::{NdjsonDecoder, Record};

/// Decode `reader` and push records into `record_tx`.
///
/// Blocks when the channel is full. Returns the number of records decoded.
pub(super) fn decode_stage<R: Read>(
    reader: R,
    buffer: usize,
    record_tx: mpsc::Sender<Record>,
    stop: CancellationToken,
) -> Result<u64, IngestError> {
    // Cancels on every exit except a clean end of stream, panics included.
    // Locals drop before parameters, so this fires before `record_tx` closes.
    let guard = stop.clone().drop_guard();

    let mut decoder = NdjsonDecoder::with_capacity(buffer, reader);
    for result in decoder.by_ref() {
        let record = result?;
        if stop.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        if record_tx.blocking_send(record).is_err() {
            // Load stage is gone; it reports its own error.
            return Err(IngestError::Cancelled);
        }
    }

    guard.disarm();
    debug!(records = decoder.decoded(), "Decode stage reached end of input");
    Ok(decoder.decoded())
}

/// Drain `record_rx` into the table inside one transaction.
///
/// Commits only if the channel closed after a clean end of input.
pub(super) fn load_stage(
    conn: &Mutex<Connection>,
    table: &str,
    mut record_rx: mpsc::Receiver<Record>,
    stop: CancellationToken,
) -> Result<LoadSummary, IngestError> {
    let guard = stop.clone().drop_guard();

    let mut conn = conn.lock().map_err(|_| IngestError::ConnectionPoisoned)?;
    let columns = existing_columns(&conn, table).context(TransactionSnafu)?;
    let tx = conn.transaction().context(TransactionSnafu)?;

    let summary = {
        let mut loader = Loader::new(&tx, SchemaManager::with_columns(table, columns));
        while let Some(record) = record_rx.blocking_recv() {
            if stop.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
            loader.load(&record)?;
        }
        if stop.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        loader.finish()
    };

    tx.commit().context(TransactionSnafu)?;
    guard.disarm();
    debug!(rows = summary.rows, "Load stage committed");
    Ok(summary)
}
