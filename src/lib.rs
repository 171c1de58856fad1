pub mod app;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use dataset::{Dataset, DatasetLoader};
pub use engine::{EngineConfig, RenderCoordinator, TimelineItem};
