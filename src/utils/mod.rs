//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Checkpoint save/load utilities
//! - Sample grid rendering

mod checkpoint;
mod config;
mod sampler;

pub use checkpoint::{
    find_latest_checkpoint, list_checkpoints, load_checkpoint, load_checkpoint_meta,
    save_checkpoint, CheckpointMeta,
};
pub use config::{Config, DataConfig, ModelConfig, TrainingConfigFile};
pub use sampler::{tile_images, GridLayout, Sampler};
