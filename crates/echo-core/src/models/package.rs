use std::collections::BTreeSet;
use std::time::SystemTime;

use serde_json::Value;

use crate::models::Metadata;
use crate::models::record::{
    Record, ValidationResult, metadata, metadata_value, optional_str, optional_timestamp,
    optional_timestamp_value, optional_u64, required_str, string_list_value,
    string_set,
};

/// A software package known to the recommender.
///
/// `dependencies` and `tags` are sets: repeated names collapse to one
/// entry, and both read back in sorted order.
#[derive(Clone, Debug, PartialEq)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub installed_date: Option<SystemTime>,
    pub source: Option<String>,
    pub size: Option<u64>,
    pub dependencies: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub metadata: Metadata,
}

impl Package {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            installed_date: None,
            source: None,
            size: None,
            dependencies: BTreeSet::new(),
            tags: BTreeSet::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("name".into(), Value::from(self.name.as_str()));
        record.insert("version".into(), Value::from(self.version.as_str()));
        record.insert("description".into(), Value::from(self.description.clone()));
        record.insert(
            "installed_date".into(),
            optional_timestamp_value(self.installed_date),
        );
        record.insert("source".into(), Value::from(self.source.clone()));
        record.insert("size".into(), Value::from(self.size));
        record.insert("dependencies".into(), string_list_value(&self.dependencies));
        record.insert("tags".into(), string_list_value(&self.tags));
        record.insert("metadata".into(), metadata_value(&self.metadata));
        record
    }

    pub fn from_record(record: &Record) -> ValidationResult<Self> {
        Ok(Self {
            name: required_str(record, "name")?,
            version: required_str(record, "version")?,
            description: optional_str(record, "description")?,
            installed_date: optional_timestamp(record, "installed_date")?,
            source: optional_str(record, "source")?,
            size: optional_u64(record, "size")?,
            dependencies: string_set(record, "dependencies")?,
            tags: string_set(record, "tags")?,
            metadata: metadata(record, "metadata")?,
        })
    }
}
