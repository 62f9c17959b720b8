use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod types;
pub mod wordbag;

pub use app_config::{AppConfig, Environment, ScoreWeights};
pub use config::{load_app_config, load_app_config_from_env};
pub use types::{
    AlertRecord, CategoryKey, CategorySnapshot, CollectedItem, JobStatus, KeywordSnapshot,
    TimeBucket,
};
pub use wordbag::{load_keywords, load_wordbag, CategoryConfig, WordbagFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read wordbag file {path}: {source}")]
    WordbagIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse wordbag file: {0}")]
    WordbagParse(#[from] serde_yaml::Error),

    #[error("failed to read keywords file {path}: {source}")]
    KeywordsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Validation(String),
}
