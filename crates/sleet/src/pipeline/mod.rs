//! Two-stage ingestion pipeline.
//!
//! ```text
//! reader ──► decode stage ──► bounded channel ──► load stage ──► SQLite
//!            (NdjsonDecoder)                      (Loader, one transaction)
//! ```
//!
//! Both stages run on the blocking pool. They share a cancellation token: a
//! stage that fails (or panics) cancels it on the way out, which stops the
//! other stage. The decode stage cancels *before* its sender is dropped, so
//! the load stage can tell a truncated stream from a finished one and roll
//! back instead of committing. Both task handles are awaited before the run
//! returns.

mod stages;

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use snafu::ResultExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sleet_core::emit;
use sleet_core::metrics::events::{
    ColumnsAdded, IngestStage, IngestionCompleted, IngestionFailed, RecordsDecoded, RecordsLoaded,
};

use crate::config::EngineConfig;
use crate::error::{IngestError, InvalidConfigSnafu, TaskJoinSnafu};

use stages::{decode_stage, load_stage};

/// Statistics for a committed ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Records decoded and inserted.
    pub records: u64,
    /// Columns added to the table by this run.
    pub columns_added: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// Run one ingestion: decode `reader` and load every record into `config.table`
/// inside a single transaction.
///
/// Cancelling `cancel` aborts the run with [`IngestError::Cancelled`]. On any
/// error nothing from this run is visible in storage. An invalid `config` is
/// rejected before any stage starts.
pub async fn run_ingestion<R>(
    conn: Arc<Mutex<Connection>>,
    config: &EngineConfig,
    reader: R,
    cancel: CancellationToken,
) -> Result<IngestStats, IngestError>
where
    R: Read + Send + 'static,
{
    config.validate().context(InvalidConfigSnafu)?;

    let start = Instant::now();
    let target = config.table.clone();

    // Child token: stage failures stop the run without cancelling the caller's token.
    let stop = cancel.child_token();
    let (record_tx, record_rx) = mpsc::channel(config.queue_capacity);

    let decode = tokio::task::spawn_blocking({
        let stop = stop.clone();
        let buffer = config.read_buffer_bytes;
        move || decode_stage(reader, buffer, record_tx, stop)
    });
    let load = tokio::task::spawn_blocking({
        let table = config.table.clone();
        move || load_stage(&conn, &table, record_rx, stop)
    });

    let (decoded, loaded) = tokio::join!(decode, load);
    let result = match (decoded.context(TaskJoinSnafu), loaded.context(TaskJoinSnafu)) {
        (Ok(decoded), Ok(loaded)) => first_error(decoded, loaded),
        (Err(e), _) | (_, Err(e)) => Err(e),
    };

    match result {
        Ok((records, summary)) => {
            let duration = start.elapsed();
            info!(
                target = %target,
                records,
                columns_added = summary.columns_added,
                duration_secs = duration.as_secs_f64(),
                "Ingestion committed"
            );
            emit!(RecordsDecoded {
                count: records,
                target: target.clone(),
            });
            emit!(RecordsLoaded {
                count: summary.rows,
                target: target.clone(),
            });
            emit!(ColumnsAdded {
                count: summary.columns_added,
                target: target.clone(),
            });
            emit!(IngestionCompleted { duration, target });
            Ok(IngestStats {
                records: summary.rows,
                columns_added: summary.columns_added,
                duration,
            })
        }
        Err(e) => {
            let stage = if e.is_cancelled() {
                IngestStage::Cancelled
            } else if e.is_decode() {
                IngestStage::Decode
            } else {
                IngestStage::Load
            };
            warn!(target = %target, stage = stage.as_str(), error = %e, "Ingestion rolled back");
            emit!(IngestionFailed { stage, target });
            Err(e)
        }
    }
}

/// Combine the stage results, reporting the root cause.
///
/// A load error wins over a decode error: the loader works on records that
/// precede anything the decoder is still reading. `Cancelled` is only
/// reported when neither stage has a real cause.
fn first_error<A, B>(
    decoded: Result<A, IngestError>,
    loaded: Result<B, IngestError>,
) -> Result<(A, B), IngestError> {
    match (decoded, loaded) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (_, Err(e)) if !e.is_cancelled() => Err(e),
        (Err(e), _) if !e.is_cancelled() => Err(e),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    fn decode_error() -> IngestError {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        DecodeError::from_json(1, source).into()
    }

    fn insert_error() -> IngestError {
        IngestError::Insert {
            source: rusqlite::Error::InvalidQuery,
        }
    }

    #[test]
    fn test_first_error_success() {
        let result = first_error::<u64, u64>(Ok(3), Ok(3));
        assert_eq!(result.unwrap(), (3, 3));
    }

    #[test]
    fn test_first_error_prefers_real_cause_over_cancellation() {
        let result = first_error::<u64, u64>(Err(IngestError::Cancelled), Err(insert_error()));
        assert!(matches!(result, Err(IngestError::Insert { .. })));

        let result = first_error::<u64, u64>(Err(decode_error()), Err(IngestError::Cancelled));
        assert!(matches!(result, Err(IngestError::Decode { .. })));
    }

    #[test]
    fn test_first_error_prefers_load_error() {
        let result = first_error::<u64, u64>(Err(decode_error()), Err(insert_error()));
        assert!(matches!(result, Err(IngestError::Insert { .. })));
    }

    struct PanickingReader;

    impl Read for PanickingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            panic!("byte source exploded");
        }
    }

    fn memory_conn() -> Arc<Mutex<Connection>> {
        Arc::new(Mutex::new(Connection::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_start() {
        let config = EngineConfig {
            queue_capacity: 0,
            ..EngineConfig::in_memory()
        };
        let reader = std::io::Cursor::new(b"{\"a\": 1}\n".to_vec());

        let err = run_ingestion(memory_conn(), &config, reader, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::InvalidConfig {
                source: crate::error::ConfigError::ZeroQueueCapacity
            }
        ));
    }

    #[tokio::test]
    async fn test_stage_panic_is_reported_and_rolled_back() {
        let conn = memory_conn();
        let err = run_ingestion(
            Arc::clone(&conn),
            &EngineConfig::in_memory(),
            PanickingReader,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, IngestError::TaskJoin { .. }));
        let conn = conn.lock().unwrap();
        assert!(crate::sink::existing_columns(&conn, "records").unwrap().is_empty());
    }

    #[test]
    fn test_first_error_both_cancelled() {
        let result = first_error::<u64, u64>(Err(IngestError::Cancelled), Err(IngestError::Cancelled));
        assert!(matches!(result, Err(IngestError::Cancelled)));
    }
}
