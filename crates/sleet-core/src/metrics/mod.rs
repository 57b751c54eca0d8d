//! Metrics emitted by the ingestion pipeline and the query facade.
//!
//! Events are recorded through the `metrics` facade; installing a recorder
//! (Prometheus, statsd, ...) is left to the embedding application.

pub mod events;

/// Emit an internal event (Vector-style pattern).
///
/// ```ignore
/// use sleet_core::emit;
/// use sleet_core::metrics::events::RecordsDecoded;
///
/// emit!(RecordsDecoded { count: 100, target: "records".to_string() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
