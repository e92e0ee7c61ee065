use std::time::SystemTime;

use serde_json::Value;

use crate::models::record::{
    Record, ValidationResult, optional_str, required_i64, required_timestamp, timestamp_value,
};

/// One applied schema version, as recorded in `database_version`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchemaVersion {
    pub version: i64,
    pub applied_at: SystemTime,
    pub description: Option<String>,
}

impl SchemaVersion {
    pub fn new(version: i64, applied_at: SystemTime) -> Self {
        Self {
            version,
            applied_at,
            description: None,
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("version".into(), Value::from(self.version));
        record.insert("applied_at".into(), timestamp_value(self.applied_at));
        record.insert("description".into(), Value::from(self.description.clone()));
        record
    }

    pub fn from_record(record: &Record) -> ValidationResult<Self> {
        Ok(Self {
            version: required_i64(record, "version")?,
            applied_at: required_timestamp(record, "applied_at")?,
            description: optional_str(record, "description")?,
        })
    }
}
