pub mod history;
pub mod smooth;

pub use history::History;
pub use smooth::{PipelineStats, SmoothingPipeline};
