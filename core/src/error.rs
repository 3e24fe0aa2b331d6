use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Libloading error: {0}")]
    Libloading(#[from] libloading::Error),
    #[error("no plugin registered with id '{0}'")]
    PluginNotFound(String),
    #[error("no suitable version {major}.{minor} of plugin '{id}'")]
    PluginVersionNotFound { id: String, major: i32, minor: i32 },
    #[error("a node named '{0}' already exists in this collection")]
    NameCollision(String),
    #[error("plugin '{plugin}' failed to construct a node: {reason}")]
    ConstructionFailed { plugin: String, reason: String },
    #[error("no writer node named '{0}' in the project")]
    WriterNotFound(String),
    #[error("frame step must be a positive integer, got {0}")]
    InvalidFrameStep(i64),
    #[error("invalid frame range {first}-{last}")]
    InvalidFrameRange { first: i64, last: i64 },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("render cancelled")]
    Cancelled,
    #[error("failed to spawn render process: {0}")]
    ProcessSpawnFailed(String),
    #[error("render of writer '{writer}' failed at frame {frame}: {reason}")]
    RenderFailed {
        writer: String,
        frame: i64,
        reason: String,
    },
    #[error("project error: {0}")]
    Project(String),
}
