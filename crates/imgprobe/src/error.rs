use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskState;

#[derive(Error, Debug)]
pub enum ImgprobeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid analyzer '{name}': {reason}")]
    InvalidAnalyzer { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to read image '{path}': {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Transform worker failed: {0}")]
    Worker(String),
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {suffix} artifact: {source}")]
    Encode {
        suffix: &'static str,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {id} is finished and can no longer be modified")]
    Frozen { id: String },

    #[error("Invalid state transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: TaskState,
        to: TaskState,
    },

    #[error("Result '{key}' of task {id} is already complete")]
    ResultAlreadySet { id: String, key: String },

    #[error("Result '{key}' was never registered for task {id}")]
    UnknownResult { id: String, key: String },

    #[error("Task {id} still has {pending} pending analyzer result(s)")]
    ResultsPending { id: String, pending: usize },

    #[error("Failed to render task {id} as JSON: {message}")]
    Render { id: String, message: String },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Task {id} worker panicked")]
    Panicked { id: String },

    #[error("Task {id} worker was aborted")]
    Aborted { id: String },
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Failed to bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),
}

pub type Result<T> = std::result::Result<T, ImgprobeError>;
