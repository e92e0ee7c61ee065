use std::fmt::{Display, Formatter};
use std::time::SystemTime;

use serde_json::Value;

use crate::models::record::{
    Record, ValidationError, ValidationResult, optional_i64, optional_str, required_bool,
    required_str, required_timestamp, timestamp_value,
};

/// What happened to a package. Operations written by other tools are kept
/// verbatim in [`InstallOperation::Other`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum InstallOperation {
    Install,
    Remove,
    Upgrade,
    Downgrade,
    Reinstall,
    Other(String),
}

impl InstallOperation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
            Self::Reinstall => "reinstall",
            Self::Other(raw) => raw,
        }
    }
}

impl Display for InstallOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for InstallOperation {
    fn from(value: &str) -> Self {
        match value {
            "install" => Self::Install,
            "remove" => Self::Remove,
            "upgrade" => Self::Upgrade,
            "downgrade" => Self::Downgrade,
            "reinstall" => Self::Reinstall,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One install/remove event. Append-only; `id` is assigned by the store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstallationRecord {
    pub id: Option<i64>,
    pub package_name: String,
    pub operation: InstallOperation,
    pub timestamp: SystemTime,
    pub success: bool,
    pub details: Option<String>,
}

impl InstallationRecord {
    pub fn new(
        package_name: impl Into<String>,
        operation: InstallOperation,
        timestamp: SystemTime,
        success: bool,
    ) -> Self {
        Self {
            id: None,
            package_name: package_name.into(),
            operation,
            timestamp,
            success,
            details: None,
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("id".into(), Value::from(self.id));
        record.insert("package_name".into(), Value::from(self.package_name.as_str()));
        record.insert("operation".into(), Value::from(self.operation.as_str()));
        record.insert("timestamp".into(), timestamp_value(self.timestamp));
        record.insert("success".into(), Value::from(self.success));
        record.insert("details".into(), Value::from(self.details.clone()));
        record
    }

    pub fn from_record(record: &Record) -> ValidationResult<Self> {
        let operation_raw = required_str(record, "operation")?;
        if operation_raw.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "operation",
                reason: "operation must not be empty".to_string(),
            });
        }
        let operation = InstallOperation::from(operation_raw.as_str());

        Ok(Self {
            id: optional_i64(record, "id")?,
            package_name: required_str(record, "package_name")?,
            operation,
            timestamp: required_timestamp(record, "timestamp")?,
            success: required_bool(record, "success")?,
            details: optional_str(record, "details")?,
        })
    }
}
