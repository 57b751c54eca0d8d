//! Streaming NDJSON decoder.
//!
//! Wraps the byte source in a `BufReader` and pulls one JSON object at a time
//! with `serde_json`'s stream deserializer, so memory use is bounded by the
//! largest single record rather than by the input size.

use std::io::{BufReader, Read};

use serde_json::de::IoRead;
use serde_json::{Deserializer, StreamDeserializer};

use crate::error::DecodeError;

use super::Record;

/// Default read buffer size (64 KiB).
pub const DEFAULT_READ_BUFFER: usize = 64 * sleet_core::KB;

/// Iterator over the records of a newline-delimited JSON stream.
///
/// Yields `Ok(record)` per object and stops after the first error. End of
/// input, including trailing whitespace, ends the iteration normally.
pub struct NdjsonDecoder<R: Read> {
    stream: StreamDeserializer<'static, IoRead<BufReader<R>>, Record>,
    decoded: u64,
    failed: bool,
}

impl<R: Read> NdjsonDecoder<R> {
    /// Create a decoder with the default read buffer.
    pub fn new(reader: R) -> Self {
        Self::with_capacity(DEFAULT_READ_BUFFER, reader)
    }

    /// Create a decoder reading through a buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        let buffered = BufReader::with_capacity(capacity, reader);
        Self {
            stream: Deserializer::from_reader(buffered).into_iter::<Record>(),
            decoded: 0,
            failed: false,
        }
    }

    /// Number of records decoded so far.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }
}

impl<R: Read> Iterator for NdjsonDecoder<R> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.stream.next()? {
            Ok(record) => {
                self.decoded += 1;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(DecodeError::from_json(self.decoded + 1, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode_all(input: &str) -> Vec<Result<Record, DecodeError>> {
        NdjsonDecoder::new(Cursor::new(input.as_bytes().to_vec())).collect()
    }

    #[test]
    fn test_decodes_one_record_per_line() {
        let results = decode_all("{\"a\": 1}\n{\"b\": \"x\"}\n");
        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.get("a").unwrap(), 1);
        let second = results[1].as_ref().unwrap();
        assert_eq!(second.get("b").unwrap(), "x");
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        assert!(decode_all("").is_empty());
        assert!(decode_all("\n\n  \n").is_empty());
    }

    #[test]
    fn test_field_order_follows_input() {
        let results = decode_all(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#);
        let keys: Vec<&str> = results[0]
            .as_ref()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_large_numbers_keep_their_text() {
        let results = decode_all(r#"{"big": 12345678901234567890, "f": 0.1}"#);
        let record = results[0].as_ref().unwrap();
        assert_eq!(record["big"].to_string(), "12345678901234567890");
        assert_eq!(record["f"].to_string(), "0.1");
    }

    #[test]
    fn test_malformed_line_reports_position_and_stops() {
        let results = decode_all("{\"a\": 1}\n{\"a\": 2}\n{\"a\": }\n{\"a\": 4}\n");
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        match &results[2] {
            Err(DecodeError::Syntax { record, line, .. }) => {
                assert_eq!(*record, 3);
                assert_eq!(*line, 3);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_object_value_is_rejected() {
        let results = decode_all("{\"a\": 1}\n[1, 2]\n");
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], Err(DecodeError::Syntax { record: 2, .. })));
    }

    #[test]
    fn test_truncated_record_is_rejected() {
        let results = decode_all("{\"a\": 1}\n{\"a\": ");
        assert!(matches!(results.last(), Some(Err(DecodeError::Syntax { .. }))));
    }

    #[test]
    fn test_decoded_counter() {
        let mut decoder = NdjsonDecoder::with_capacity(8, Cursor::new(b"{}\n{}\n".to_vec()));
        assert!(decoder.next().is_some());
        assert!(decoder.next().is_some());
        assert!(decoder.next().is_none());
        assert_eq!(decoder.decoded(), 2);
    }
}
