pub mod codec;
pub mod config;
pub mod error;
pub mod nn;
pub mod pipeline;
pub mod predictor;
pub mod record;
pub mod store;
pub mod trainer;
pub mod training;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use nn::{ActivationFunction, ModelSnapshot, RegressionModel};
pub use pipeline::{ModelSource, Pipeline};
pub use predictor::{PredictionResult, Predictor, RecentInputs};
pub use record::{Field, PropertyFeatures, PropertyRecord, UserInput};
pub use store::{FileModelStore, MemoryModelStore, ModelStore};
pub use trainer::{TrainedModel, Trainer};
pub use training::{Checkpoint, Training, TrainingReport};
