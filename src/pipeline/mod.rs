pub mod compose;
pub mod orchestrator;
pub mod render;
pub mod request;
pub mod retrieve;
pub mod window;

pub use orchestrator::{ReportGenerator, ReportOutcome, ReportSettings};
pub use request::{ReportRequest, ValidatedRequest};
pub use window::{Clock, SystemClock, TimeWindow};
