//! Typed views of the columns each gateway query selects. Rows are decoded
//! positionally, then converted into entities in one place.

use std::collections::BTreeSet;
use std::time::SystemTime;

use rusqlite::Row;

use crate::models::{
    InstallOperation, InstallationRecord, Package, Recommendation, SchemaVersion, UsagePattern,
    decode_metadata, from_unix_nanos,
};

const DEFAULT_CATEGORY: &str = "general";
const DEFAULT_SOURCE: &str = "unknown";

pub(crate) struct PackageRow {
    name: String,
    version: String,
    description: Option<String>,
    installed_date: Option<i64>,
    source: Option<String>,
    size: Option<i64>,
    metadata: Option<String>,
}

impl PackageRow {
    pub(crate) const SELECT: &'static str = "
SELECT name, version, description, installed_date, source, size, metadata
FROM packages
";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            version: row.get(1)?,
            description: row.get(2)?,
            installed_date: row.get(3)?,
            source: row.get(4)?,
            size: row.get(5)?,
            metadata: row.get(6)?,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_package(
        self,
        dependencies: BTreeSet<String>,
        tags: BTreeSet<String>,
    ) -> rusqlite::Result<Package> {
        Ok(Package {
            installed_date: self
                .installed_date
                .map(|value| timestamp("installed_date", value))
                .transpose()?,
            size: self
                .size
                .map(|value| non_negative("size", value))
                .transpose()?,
            metadata: decode_metadata(self.metadata.as_deref()),
            name: self.name,
            version: self.version,
            description: self.description,
            source: self.source,
            dependencies,
            tags,
        })
    }
}

pub(crate) struct UsagePatternRow {
    package_name: String,
    frequency: i64,
    last_used: Option<i64>,
    importance_score: Option<f64>,
    metadata: Option<String>,
}

impl UsagePatternRow {
    pub(crate) const SELECT: &'static str = "
SELECT package_name, frequency, last_used, importance_score, metadata
FROM usage_patterns
";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            package_name: row.get(0)?,
            frequency: row.get(1)?,
            last_used: row.get(2)?,
            importance_score: row.get(3)?,
            metadata: row.get(4)?,
        })
    }

    pub(crate) fn package_name(&self) -> &str {
        &self.package_name
    }

    pub(crate) fn into_usage_pattern(
        self,
        usage_contexts: BTreeSet<String>,
    ) -> rusqlite::Result<UsagePattern> {
        let last_used = self
            .last_used
            .ok_or_else(|| conversion_error("usage pattern row has no last_used value"))?;

        Ok(UsagePattern {
            frequency: non_negative("frequency", self.frequency)?,
            last_used: timestamp("last_used", last_used)?,
            metadata: decode_metadata(self.metadata.as_deref()),
            package_name: self.package_name,
            importance_score: self.importance_score,
            usage_contexts,
        })
    }
}

pub(crate) struct RecommendationRow {
    id: i64,
    package_name: String,
    score: f64,
    reason: Option<String>,
    category: Option<String>,
    timestamp: Option<i64>,
    source: Option<String>,
    metadata: Option<String>,
}

impl RecommendationRow {
    pub(crate) const SELECT: &'static str = "
SELECT id, package_name, score, reason, category, timestamp, source, metadata
FROM recommendations
";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            package_name: row.get(1)?,
            score: row.get(2)?,
            reason: row.get(3)?,
            category: row.get(4)?,
            timestamp: row.get(5)?,
            source: row.get(6)?,
            metadata: row.get(7)?,
        })
    }

    pub(crate) fn into_recommendation(self) -> rusqlite::Result<Recommendation> {
        let timestamp_raw = self
            .timestamp
            .ok_or_else(|| conversion_error("recommendation row has no timestamp"))?;

        Ok(Recommendation {
            id: Some(self.id),
            package_name: self.package_name,
            score: self.score,
            reason: self.reason.unwrap_or_default(),
            category: self
                .category
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            timestamp: timestamp("timestamp", timestamp_raw)?,
            source: self.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            metadata: decode_metadata(self.metadata.as_deref()),
        })
    }
}

pub(crate) struct InstallationRow {
    id: i64,
    package_name: String,
    operation: String,
    timestamp: i64,
    success: i64,
    details: Option<String>,
}

impl InstallationRow {
    pub(crate) const SELECT: &'static str = "
SELECT id, package_name, operation, timestamp, success, details
FROM installation_history
";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            package_name: row.get(1)?,
            operation: row.get(2)?,
            timestamp: row.get(3)?,
            success: row.get(4)?,
            details: row.get(5)?,
        })
    }

    pub(crate) fn into_record(self) -> rusqlite::Result<InstallationRecord> {
        Ok(InstallationRecord {
            id: Some(self.id),
            package_name: self.package_name,
            operation: InstallOperation::from(self.operation.as_str()),
            timestamp: timestamp("timestamp", self.timestamp)?,
            success: sqlite_to_bool(self.success),
            details: self.details,
        })
    }
}

pub(crate) struct SchemaVersionRow {
    version: i64,
    applied_at: i64,
    description: Option<String>,
}

impl SchemaVersionRow {
    pub(crate) const SELECT: &'static str = "
SELECT version, applied_at, description
FROM database_version
";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            version: row.get(0)?,
            applied_at: row.get(1)?,
            description: row.get(2)?,
        })
    }

    pub(crate) fn into_schema_version(self) -> rusqlite::Result<SchemaVersion> {
        Ok(SchemaVersion {
            version: self.version,
            applied_at: timestamp("applied_at", self.applied_at)?,
            description: self.description,
        })
    }
}

pub(crate) fn bool_to_sqlite(value: bool) -> i64 {
    if value { 1 } else { 0 }
}

fn sqlite_to_bool(value: i64) -> bool {
    value != 0
}

fn timestamp(column: &str, value: i64) -> rusqlite::Result<SystemTime> {
    from_unix_nanos(value).ok_or_else(|| {
        conversion_error(&format!(
            "column '{column}' holds unsupported timestamp {value}"
        ))
    })
}

fn non_negative(column: &str, value: i64) -> rusqlite::Result<u64> {
    u64::try_from(value).map_err(|_| {
        conversion_error(&format!("column '{column}' holds negative value {value}"))
    })
}

pub(crate) fn conversion_error(message: &str) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(message.to_string())))
}
