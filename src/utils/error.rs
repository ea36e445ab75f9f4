use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("unknown platform: {name}")]
    UnknownPlatform { name: String },

    #[error("unknown platform group: {name}")]
    UnknownGroup { name: String },

    #[error("no valid platforms to search")]
    EmptyPlatformSet,

    #[error("failed to start backend command: {0}")]
    Invocation(#[source] std::io::Error),

    #[error("backend timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("backend exited with code {code}: {detail}")]
    NonZeroExit { code: i32, detail: String },

    #[error("no valid JSON found in output: {detail}")]
    JsonParse { detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {field}: {reason}")]
    InvalidConfigValue { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SearchError>;
