#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SchemaMigration {
    pub version: i64,
    pub name: &'static str,
    pub description: &'static str,
    pub up_sql: &'static str,
}

const MIGRATION_0001: SchemaMigration = SchemaMigration {
    version: 1,
    name: "initial_schema",
    description: "Initial schema creation",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS packages (
    name TEXT PRIMARY KEY,
    version TEXT NOT NULL,
    description TEXT,
    installed_date INTEGER,
    source TEXT,
    size INTEGER,
    metadata TEXT
);

CREATE TABLE IF NOT EXISTS package_dependencies (
    package_name TEXT NOT NULL,
    dependency_name TEXT NOT NULL,
    PRIMARY KEY (package_name, dependency_name),
    FOREIGN KEY (package_name) REFERENCES packages (name)
);

CREATE TABLE IF NOT EXISTS package_tags (
    package_name TEXT NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (package_name, tag),
    FOREIGN KEY (package_name) REFERENCES packages (name)
);

CREATE TABLE IF NOT EXISTS usage_patterns (
    package_name TEXT PRIMARY KEY,
    frequency INTEGER NOT NULL,
    last_used INTEGER,
    importance_score REAL,
    metadata TEXT,
    FOREIGN KEY (package_name) REFERENCES packages (name)
);

CREATE TABLE IF NOT EXISTS usage_contexts (
    package_name TEXT NOT NULL,
    context TEXT NOT NULL,
    PRIMARY KEY (package_name, context),
    FOREIGN KEY (package_name) REFERENCES packages (name)
);

CREATE TABLE IF NOT EXISTS recommendations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    package_name TEXT NOT NULL,
    score REAL NOT NULL,
    reason TEXT,
    category TEXT,
    timestamp INTEGER,
    source TEXT,
    metadata TEXT
);

CREATE TABLE IF NOT EXISTS installation_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    package_name TEXT NOT NULL,
    operation TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    success INTEGER NOT NULL,
    details TEXT
);

CREATE TABLE IF NOT EXISTS database_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL,
    description TEXT
);
"#,
};

const MIGRATIONS: [SchemaMigration; 1] = [MIGRATION_0001];

/// Tables every initialized store must contain.
pub const SCHEMA_TABLES: [&str; 8] = [
    "packages",
    "package_dependencies",
    "package_tags",
    "usage_patterns",
    "usage_contexts",
    "recommendations",
    "installation_history",
    "database_version",
];

pub fn migrations() -> &'static [SchemaMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SchemaMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}
