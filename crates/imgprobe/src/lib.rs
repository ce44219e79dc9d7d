pub mod analyzer;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod storage;
pub mod task;
pub mod transform;
pub mod worker;

pub use analyzer::{Analyzer, AnalyzerKind, AnalyzerOutcome, AnalyzerRoster, ExternalAnalyzer};
pub use broadcast::{TaskProgressBroadcaster, TaskProgressEvent};
pub use config::{load_config, resolve_config, Config};
pub use error::{
    ArtifactError, ConfigError, DispatchError, ImgprobeError, Result, TaskError, TransformError,
};
pub use pipeline::{Pipeline, PipelineConfig, TaskContext};
pub use storage::{ArtifactFormat, ArtifactKind};
pub use task::{AnalysisTask, ResultKey, ResultStatus, StatusReporter, SubmitResponse, TaskState, TaskStore};
pub use transform::{Narrowing, TransformKind};
pub use worker::{DispatchLimits, Dispatcher, TaskHandle, TaskOutcome};
