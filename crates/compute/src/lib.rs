pub mod pipeline;
pub mod report;

pub use pipeline::filter::{Exclusion, FilterStats, ValidTransaction};
pub use pipeline::metrics::PipelineMetrics;
pub use pipeline::{CohortPipeline, PipelineOutput};
pub use report::{Cell, CohortReport, ReportKind, ReportTable};
