pub mod classifier;
pub mod config;
pub mod forensics;
pub mod handlers;
pub mod metric;
pub mod report;
pub mod sanitize;
pub mod server;

pub use classifier::{Classification, Classifier, NoiseFilter};
pub use config::{Config, NoiseRule};
pub use forensics::ForensicWriter;
pub use metric::{MemorySink, MetricLogger, MetricSink};
pub use report::{CapturedRequest, ReportItem};
pub use sanitize::sanitize;
pub use server::{Collector, CollectorState};
