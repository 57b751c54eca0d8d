//! Input side of the pipeline: decoding records from a byte stream.

mod reader;

pub use reader::{DEFAULT_READ_BUFFER, NdjsonDecoder};

/// One decoded JSON object; fields keep their input order.
pub type Record = serde_json::Map<String, serde_json::Value>;
