//! Pipeline orchestration: sources, prefilter, run driver and reports

mod cancel;
mod orchestrator;
mod prefilter;
mod report;
mod source;

pub use cancel::CancellationToken;
pub use orchestrator::{PipelineOrchestrator, RunOptions, RunPhase};
pub use prefilter::{Prefilter, Rejection};
pub use report::{RecordErrors, RunReport, ServiceReport};
pub use source::{FetchSource, JsonLinesSource};
