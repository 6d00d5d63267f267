//! Provider client, capability pipelines and the workbench that drives them.

pub mod client;
pub mod config;
pub mod pipelines;
pub mod video;
pub mod workbench;

#[cfg(test)]
mod testing;

pub use client::{GenerationClient, SiliconFlowClient, VideoStatus};
pub use config::{ConfigError, EngineConfig};
pub use workbench::Workbench;
