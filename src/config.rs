use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::nn::ActivationFunction;
use crate::training::{
    DEFAULT_ERROR_THRESHOLD, DEFAULT_LEARNING_RATE, DEFAULT_MAX_ITERATIONS, DEFAULT_MOMENTUM,
};

/// Training hyperparameters for the pipeline.
///
/// Normalization constants live in [`crate::codec`] and are deliberately
/// not part of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_iterations: u32,
    pub error_threshold: f64,
    pub learning_rate: f64,
    pub momentum: f64,
    pub activation: ActivationFunction,
    pub log_interval: Option<u32>,
    pub checkpoint_interval: Option<u32>,
    /// Fixed seed for weight initialization; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            learning_rate: DEFAULT_LEARNING_RATE,
            momentum: DEFAULT_MOMENTUM,
            activation: ActivationFunction::Sigmoid,
            log_interval: Some(500),
            checkpoint_interval: Some(100),
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
