use thiserror::Error;

pub type Result<T> = std::result::Result<T, HodgeError>;

#[derive(Error, Debug)]
pub enum HodgeError {
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store is closed")]
    StoreClosed,

    #[error("cluster '{cluster}' is not initialized")]
    ClusterNotInitialized { cluster: String },

    #[error("failed to update replication group {rgid}: {source}")]
    GroupUpdateFailed {
        rgid: i32,
        #[source]
        source: Box<HodgeError>,
    },

    #[error("group command failed: {0}")]
    GroupCommand(String),

    #[error("replication group {0} has no master")]
    NoMaster(i32),

    #[error("version conflict on {key}")]
    VersionConflict { key: String },

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HodgeError {
    pub fn decode(what: impl Into<String>, source: serde_json::Error) -> Self {
        HodgeError::Decode {
            what: what.into(),
            source,
        }
    }
}

impl From<etcd_client::Error> for HodgeError {
    fn from(err: etcd_client::Error) -> Self {
        HodgeError::Backend(err.to_string())
    }
}
