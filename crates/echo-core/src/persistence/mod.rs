use crate::error::StoreError;
use crate::models::{InstallationRecord, Package, Recommendation, SchemaVersion, UsagePattern};

pub type PersistenceResult<T> = Result<T, StoreError>;

pub trait SchemaStore: Send + Sync {
    /// Brings the schema to the latest version. Repeat calls are no-ops.
    fn initialize(&self) -> PersistenceResult<()>;

    /// Highest recorded schema version, or 0 when none has been recorded.
    fn schema_version(&self) -> PersistenceResult<i64>;

    /// Every recorded schema version, oldest first. Empty before
    /// initialization.
    fn schema_versions(&self) -> PersistenceResult<Vec<SchemaVersion>>;
}

pub trait PackageStore: Send + Sync {
    fn upsert_package(&self, package: &Package) -> PersistenceResult<()>;

    fn get_package(&self, name: &str) -> PersistenceResult<Option<Package>>;

    fn list_packages(&self) -> PersistenceResult<Vec<Package>>;
}

pub trait UsageStore: Send + Sync {
    fn upsert_usage_pattern(&self, pattern: &UsagePattern) -> PersistenceResult<()>;

    /// Most frequently used first.
    fn list_usage_patterns(&self) -> PersistenceResult<Vec<UsagePattern>>;
}

pub trait RecommendationStore: Send + Sync {
    /// Appends and returns the assigned id.
    fn add_recommendation(&self, recommendation: &Recommendation) -> PersistenceResult<i64>;

    /// Newest first, optionally restricted to one source.
    fn list_recommendations(
        &self,
        limit: usize,
        source: Option<&str>,
    ) -> PersistenceResult<Vec<Recommendation>>;
}

pub trait InstallationStore: Send + Sync {
    /// Appends and returns the assigned id.
    fn record_installation(&self, record: &InstallationRecord) -> PersistenceResult<i64>;

    /// Newest first, optionally restricted to one package.
    fn list_installation_history(
        &self,
        limit: usize,
        package_name: Option<&str>,
    ) -> PersistenceResult<Vec<InstallationRecord>>;
}
