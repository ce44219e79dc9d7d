//! Task records, the shared store and the status view over it.

pub mod record;
pub mod status;
pub mod store;

pub use record::{AnalysisTask, AnalyzerResult, ResultKey, ResultStatus, TaskState};
pub use status::{StatusReporter, SubmitResponse};
pub use store::{TaskCounts, TaskStore};
