pub mod config;
pub mod error;
pub mod models;

pub use config::{ClassifierConfig, ListingConfig, PipelineConfig, SourcesConfig, TopicConfig};
pub use error::{CoreError, ExitCode, Result};
pub use models::*;
