pub mod catalog;
pub mod error;
pub mod pipeline;

pub use catalog::catalog;
pub use error::PipelineError;
pub use pipeline::{
    from_images, from_viewpoints, photogrammetry_pipeline, photogrammetry_pipeline_with_config,
    PipelineInputs,
};
