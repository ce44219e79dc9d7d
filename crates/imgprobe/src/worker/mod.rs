pub mod dispatcher;
pub mod handle;

pub use dispatcher::{DispatchLimits, Dispatcher};
pub use handle::{TaskHandle, TaskOutcome};
