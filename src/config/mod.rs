pub mod pipeline;

pub use pipeline::{load_config_default, load_config_from, PipelineConfig};
