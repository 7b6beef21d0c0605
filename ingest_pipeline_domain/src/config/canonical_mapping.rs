// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Canonical Mapping
//!
//! Declarative mapping documents: how raw source records become canonical
//! records, and which slowly-changing-dimension semantics the canonical
//! table carries. Mappings are data, not code; the transformer interprets
//! them at run time and no per-table transformer is generated.
//!
//! One document exists per canonical table. Per source system it lists an
//! ordered set of field rules (`source_field -> canonical_field` with an
//! optional type coercion) plus constant additions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::RESERVED_METADATA_FIELDS;
use crate::value_objects::TableName;
use crate::IngestError;

/// Slowly-changing-dimension semantics of one canonical table.
///
/// The tag selects between the two sink strategies; there is no per-record
/// dispatch beyond this variant. The wire form is `type_1`/`type_2` with an
/// explicit rename on each variant; serde's snake_case rule would render
/// these as `type1`/`type2` and reject every mapping document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScdType {
    /// Update-in-place; history not retained
    #[serde(rename = "type_1")]
    Type1,
    /// Versioned history with `effective_start_date` / `is_current`
    #[serde(rename = "type_2")]
    Type2,
}

impl ScdType {
    /// Stable string form used in mapping documents and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ScdType::Type1 => "type_1",
            ScdType::Type2 => "type_2",
        }
    }
}

/// Optional type coercion applied after a field rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl Coercion {
    /// Applies the coercion to one JSON value
    ///
    /// Nulls pass through untouched. A value that cannot be represented in
    /// the target type is a data-format error; the transform counts it
    /// against the skip quota rather than failing the whole invocation.
    pub fn apply(&self, value: &Value) -> Result<Value, IngestError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Coercion::String => Ok(match value {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            }),
            Coercion::Integer => match value {
                Value::Number(n) if n.as_i64().is_some() => Ok(value.clone()),
                Value::Number(n) => n
                    .as_f64()
                    .map(|f| Value::Number((f as i64).into()))
                    .ok_or_else(|| IngestError::data_format(format!("cannot coerce {} to integer", n))),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|i| Value::Number(i.into()))
                    .map_err(|_| IngestError::data_format(format!("cannot coerce '{}' to integer", s))),
                other => Err(IngestError::data_format(format!(
                    "cannot coerce {} to integer",
                    other
                ))),
            },
            Coercion::Float => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| IngestError::data_format(format!("cannot coerce '{}' to float", s))),
                other => Err(IngestError::data_format(format!("cannot coerce {} to float", other))),
            },
            Coercion::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err(IngestError::data_format(format!("cannot coerce '{}' to boolean", s))),
                },
                Value::Number(n) => Ok(Value::Bool(n.as_i64() != Some(0))),
                other => Err(IngestError::data_format(format!(
                    "cannot coerce {} to boolean",
                    other
                ))),
            },
            Coercion::Timestamp => match value {
                Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                    .map(|dt| {
                        Value::String(dt.with_timezone(&chrono::Utc).to_rfc3339())
                    })
                    .map_err(|_| {
                        IngestError::data_format(format!("cannot coerce '{}' to timestamp", s))
                    }),
                other => Err(IngestError::data_format(format!(
                    "cannot coerce {} to timestamp",
                    other
                ))),
            },
        }
    }
}

/// One field mapping rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub source_field: String,
    pub canonical_field: String,
    #[serde(default)]
    pub coerce: Option<Coercion>,
}

/// The rules one source system contributes to a canonical table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceMapping {
    #[serde(default)]
    pub field_rules: Vec<FieldRule>,
    /// Constant fields added to every record of this source
    #[serde(default)]
    pub constants: HashMap<String, Value>,
}

/// The mapping document of one canonical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMapping {
    pub canonical_table: TableName,
    pub scd_type: ScdType,
    /// Keyed by source system (service) identifier
    #[serde(default)]
    pub sources: HashMap<String, SourceMapping>,
}

impl CanonicalMapping {
    /// Finds the rules for one source system
    pub fn source_for(&self, service: &str) -> Option<&SourceMapping> {
        self.sources.get(service)
    }

    /// Validates the document; called once at load time
    ///
    /// Rejects empty rule sets, duplicate canonical fields, and canonical
    /// fields that collide with reserved metadata columns.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.sources.is_empty() {
            return Err(IngestError::configuration(format!(
                "mapping for '{}' declares no sources",
                self.canonical_table
            )));
        }
        for (service, source) in &self.sources {
            if source.field_rules.is_empty() {
                return Err(IngestError::configuration(format!(
                    "mapping for '{}' source '{}' has no field rules",
                    self.canonical_table, service
                )));
            }
            let mut seen = std::collections::HashSet::new();
            for rule in &source.field_rules {
                if rule.source_field.trim().is_empty() || rule.canonical_field.trim().is_empty() {
                    return Err(IngestError::configuration(format!(
                        "mapping for '{}' source '{}' has a rule with empty field names",
                        self.canonical_table, service
                    )));
                }
                if RESERVED_METADATA_FIELDS.contains(&rule.canonical_field.as_str()) {
                    return Err(IngestError::configuration(format!(
                        "mapping for '{}' source '{}' writes reserved field '{}'",
                        self.canonical_table, service, rule.canonical_field
                    )));
                }
                if !seen.insert(rule.canonical_field.as_str()) {
                    return Err(IngestError::configuration(format!(
                        "mapping for '{}' source '{}' maps canonical field '{}' twice",
                        self.canonical_table, service, rule.canonical_field
                    )));
                }
            }
            for constant in source.constants.keys() {
                if RESERVED_METADATA_FIELDS.contains(&constant.as_str()) {
                    return Err(IngestError::configuration(format!(
                        "mapping for '{}' source '{}' constant writes reserved field '{}'",
                        self.canonical_table, service, constant
                    )));
                }
            }
        }
        Ok(())
    }
}
