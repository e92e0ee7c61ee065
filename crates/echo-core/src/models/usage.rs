use std::collections::BTreeSet;
use std::time::SystemTime;

use serde_json::Value;

use crate::models::Metadata;
use crate::models::record::{
    Record, ValidationResult, metadata, metadata_value, optional_f64, required_str,
    required_timestamp, required_u64, string_list_value, string_set, timestamp_value,
};

/// How often and in which contexts a package gets used.
#[derive(Clone, Debug, PartialEq)]
pub struct UsagePattern {
    pub package_name: String,
    pub frequency: u64,
    pub last_used: SystemTime,
    pub usage_contexts: BTreeSet<String>,
    pub importance_score: Option<f64>,
    pub metadata: Metadata,
}

impl UsagePattern {
    pub fn new(package_name: impl Into<String>, frequency: u64, last_used: SystemTime) -> Self {
        Self {
            package_name: package_name.into(),
            frequency,
            last_used,
            usage_contexts: BTreeSet::new(),
            importance_score: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_usage_contexts(
        mut self,
        contexts: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.usage_contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("package_name".into(), Value::from(self.package_name.as_str()));
        record.insert("frequency".into(), Value::from(self.frequency));
        record.insert("last_used".into(), timestamp_value(self.last_used));
        record.insert(
            "usage_contexts".into(),
            string_list_value(&self.usage_contexts),
        );
        record.insert(
            "importance_score".into(),
            Value::from(self.importance_score),
        );
        record.insert("metadata".into(), metadata_value(&self.metadata));
        record
    }

    pub fn from_record(record: &Record) -> ValidationResult<Self> {
        Ok(Self {
            package_name: required_str(record, "package_name")?,
            frequency: required_u64(record, "frequency")?,
            last_used: required_timestamp(record, "last_used")?,
            usage_contexts: string_set(record, "usage_contexts")?,
            importance_score: optional_f64(record, "importance_score")?,
            metadata: metadata(record, "metadata")?,
        })
    }
}
