pub mod limiter;
pub mod pipeline;

pub use limiter::{AdmissionLimiter, AdmissionToken};
pub use pipeline::{Dispatcher, PipelineOptions};
