use std::time::SystemTime;

use serde_json::Value;

use crate::models::Metadata;
use crate::models::record::{
    Record, ValidationResult, metadata, metadata_value, optional_i64, required_f64, required_str,
    required_timestamp, timestamp_value,
};

/// A recommendation emitted by one of the recommender sources (`"ai"`,
/// `"similarity"`, ...). `id` is assigned by the store on append.
#[derive(Clone, Debug, PartialEq)]
pub struct Recommendation {
    pub id: Option<i64>,
    pub package_name: String,
    pub score: f64,
    pub reason: String,
    pub category: String,
    pub timestamp: SystemTime,
    pub source: String,
    pub metadata: Metadata,
}

impl Recommendation {
    pub fn new(
        package_name: impl Into<String>,
        score: f64,
        reason: impl Into<String>,
        category: impl Into<String>,
        source: impl Into<String>,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            id: None,
            package_name: package_name.into(),
            score,
            reason: reason.into(),
            category: category.into(),
            timestamp,
            source: source.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("id".into(), Value::from(self.id));
        record.insert("package_name".into(), Value::from(self.package_name.as_str()));
        record.insert("score".into(), Value::from(self.score));
        record.insert("reason".into(), Value::from(self.reason.as_str()));
        record.insert("category".into(), Value::from(self.category.as_str()));
        record.insert("timestamp".into(), timestamp_value(self.timestamp));
        record.insert("source".into(), Value::from(self.source.as_str()));
        record.insert("metadata".into(), metadata_value(&self.metadata));
        record
    }

    pub fn from_record(record: &Record) -> ValidationResult<Self> {
        Ok(Self {
            id: optional_i64(record, "id")?,
            package_name: required_str(record, "package_name")?,
            score: required_f64(record, "score")?,
            reason: required_str(record, "reason")?,
            category: required_str(record, "category")?,
            timestamp: required_timestamp(record, "timestamp")?,
            source: required_str(record, "source")?,
            metadata: metadata(record, "metadata")?,
        })
    }
}
