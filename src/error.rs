use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModupError {
    #[error("invalid module path '{0}'")]
    InvalidModulePath(String),

    #[error("invalid upgrade version '{0}'")]
    InvalidVersion(String),

    #[error("module not a known dependency: {0}")]
    NotADependency(String),

    #[error("no versions available for upgrade")]
    NoUpgradeAvailable,

    #[error("no release of {path} matches version {version}")]
    VersionNotFound { path: String, version: String },

    #[error("version index query failed: {0}")]
    QueryFailure(String),

    #[error("invalid import path after upgrade: {0}")]
    InvalidImportAfterRewrite(String),

    #[error("conflicting upgrade targets: {first} and {second} both upgrade to {target}")]
    ConflictingUpgradeTargets {
        first: String,
        second: String,
        target: String,
    },

    #[error("go.mod parsing failed: {0}")]
    ManifestParsing(String),

    #[error("failed to write {path}: {source}")]
    Persistence {
        path: String,
        source: std::io::Error,
    },

    #[error("package loading failed: {0}")]
    PackageLoading(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModupError>;
