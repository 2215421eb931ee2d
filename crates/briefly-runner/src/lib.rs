pub mod config;
pub mod cycle;
pub mod mailer;
pub mod news;
pub mod render;
pub mod retry;
pub mod summarizer;
pub mod template;

pub use config::PipelineConfig;
pub use cycle::{CycleOutcome, CycleSettings, Pipeline};
