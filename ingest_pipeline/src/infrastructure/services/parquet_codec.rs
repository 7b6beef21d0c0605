// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Parquet Record Codec
//!
//! Arrow-backed implementation of the [`RecordCodec`] port. Encoding infers
//! an Arrow schema from the JSON records (raw objects have no declared
//! schema; canonical objects derive theirs from the mapping output) and
//! writes one snappy-compressed Parquet buffer. Decoding sniffs the `PAR1`
//! magic to distinguish Parquet from legacy JSON-array raw objects.

use std::sync::Arc;

use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::{ArrayWriter, ReaderBuilder};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::{Map, Value};

use ingest_pipeline_domain::services::RecordCodec;
use ingest_pipeline_domain::IngestError;

const PARQUET_MAGIC: &[u8] = b"PAR1";

/// Snappy Parquet codec with JSON fallback on read.
pub struct ParquetRecordCodec;

impl ParquetRecordCodec {
    pub fn new() -> Self {
        Self
    }

    fn decode_parquet(bytes: &[u8]) -> Result<Vec<Map<String, Value>>, IngestError> {
        let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes.to_vec()))
            .map_err(|e| IngestError::data_format(format!("unreadable parquet object: {}", e)))?
            .build()
            .map_err(|e| IngestError::data_format(format!("unreadable parquet object: {}", e)))?;

        let mut writer = ArrayWriter::new(Vec::new());
        for batch in reader {
            let batch = batch
                .map_err(|e| IngestError::data_format(format!("corrupt parquet batch: {}", e)))?;
            writer
                .write(&batch)
                .map_err(|e| IngestError::serialization(format!("parquet to JSON failed: {}", e)))?;
        }
        writer
            .finish()
            .map_err(|e| IngestError::serialization(format!("parquet to JSON failed: {}", e)))?;
        let json = writer.into_inner();
        if json.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&json)
            .map_err(|e| IngestError::serialization(format!("parquet row set unreadable: {}", e)))
    }

    fn decode_json(bytes: &[u8]) -> Result<Vec<Map<String, Value>>, IngestError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| IngestError::data_format(format!("object is neither parquet nor JSON: {}", e)))?;
        let Value::Array(items) = value else {
            return Err(IngestError::data_format("JSON object is not a record array"));
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(IngestError::data_format(format!(
                    "non-object entry in record array: {}",
                    other
                ))),
            })
            .collect()
    }
}

impl Default for ParquetRecordCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCodec for ParquetRecordCodec {
    fn encode_records(&self, records: &[Map<String, Value>]) -> Result<Vec<u8>, IngestError> {
        if records.is_empty() {
            return Err(IngestError::serialization(
                "refusing to encode an empty record set",
            ));
        }
        let values: Vec<Value> = records
            .iter()
            .map(|r| Value::Object(r.clone()))
            .collect();
        let schema = infer_json_schema_from_iterator(values.iter().map(|v| Ok(v.clone())))
            .map_err(|e| IngestError::data_format(format!("schema inference failed: {}", e)))?;

        let mut decoder = ReaderBuilder::new(Arc::new(schema))
            .build_decoder()
            .map_err(|e| IngestError::serialization(format!("arrow decoder failed: {}", e)))?;
        decoder
            .serialize(&values)
            .map_err(|e| IngestError::data_format(format!("records do not fit schema: {}", e)))?;
        let batch = decoder
            .flush()
            .map_err(|e| IngestError::serialization(format!("arrow flush failed: {}", e)))?
            .ok_or_else(|| IngestError::serialization("arrow produced no batch"))?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
            .map_err(|e| IngestError::serialization(format!("parquet writer failed: {}", e)))?;
        writer
            .write(&batch)
            .map_err(|e| IngestError::serialization(format!("parquet write failed: {}", e)))?;
        writer
            .close()
            .map_err(|e| IngestError::serialization(format!("parquet close failed: {}", e)))?;
        Ok(buffer)
    }

    fn decode_records(&self, bytes: &[u8]) -> Result<Vec<Map<String, Value>>, IngestError> {
        if bytes.starts_with(PARQUET_MAGIC) {
            Self::decode_parquet(bytes)
        } else {
            Self::decode_json(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Map<String, Value>> {
        (0..3)
            .map(|i| {
                let mut map = Map::new();
                map.insert("id".into(), json!(format!("t{}", i)));
                map.insert("amount".into(), json!(i as f64 * 1.5));
                map.insert("open".into(), json!(i % 2 == 0));
                map
            })
            .collect()
    }

    #[test]
    fn parquet_round_trip_preserves_rows() {
        let codec = ParquetRecordCodec::new();
        let bytes = codec.encode_records(&records()).unwrap();
        assert!(bytes.starts_with(PARQUET_MAGIC));
        let decoded = codec.decode_records(&bytes).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[1].get("id"), Some(&json!("t1")));
        assert_eq!(decoded[0].get("open"), Some(&json!(true)));
    }

    #[test]
    fn legacy_json_arrays_decode() {
        let codec = ParquetRecordCodec::new();
        let decoded = codec
            .decode_records(br#"[{"id": "a"}, {"id": "b"}]"#)
            .unwrap();
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn empty_record_sets_are_rejected() {
        let codec = ParquetRecordCodec::new();
        assert!(codec.encode_records(&[]).is_err());
    }

    #[test]
    fn garbage_is_a_data_format_error() {
        let codec = ParquetRecordCodec::new();
        let err = codec.decode_records(b"\x00\x01\x02").unwrap_err();
        assert_eq!(err.kind(), ingest_pipeline_domain::ErrorKind::DataFormat);
    }
}
