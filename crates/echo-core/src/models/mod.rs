pub mod installation;
pub mod metadata;
pub mod package;
pub mod recommendation;
pub mod record;
pub mod schema_version;
pub mod usage;

pub use installation::{InstallOperation, InstallationRecord};
pub use metadata::{Metadata, decode_metadata, encode_metadata};
pub use package::Package;
pub use recommendation::Recommendation;
pub use record::{Record, ValidationError, ValidationResult, from_unix_nanos, unix_nanos};
pub use schema_version::SchemaVersion;
pub use usage::UsagePattern;
