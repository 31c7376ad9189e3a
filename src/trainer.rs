use log::info;

use crate::codec::{self, NormalizedSample};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::nn::RegressionModel;
use crate::record::PropertyRecord;
use crate::store::ModelStore;
use crate::training::TrainingReport;

/// A freshly trained model and how its training went.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: RegressionModel,
    pub report: TrainingReport,
}

/// Builds a model from a labeled dataset and persists it.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: PipelineConfig,
}

impl Trainer {
    pub fn new(config: PipelineConfig) -> Self {
        Trainer { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Nothing is saved unless training completes.
    pub fn train_from_dataset<S: ModelStore + ?Sized>(
        &self,
        records: &[PropertyRecord],
        store: &mut S,
    ) -> Result<TrainedModel> {
        let samples = training_samples(records)?;

        let mut model = match self.config.seed {
            Some(seed) => RegressionModel::seeded(seed),
            None => RegressionModel::new(),
        };
        model.activation(self.config.activation);

        let report = model
            .train(&samples)
            .rate(self.config.learning_rate)
            .momentum(self.config.momentum)
            .max_iterations(self.config.max_iterations)
            .error_threshold(self.config.error_threshold)
            .log_interval(self.config.log_interval)
            .checkpoint_interval(self.config.checkpoint_interval)
            .go()?;

        store.save(&model.serialize()?)?;
        info!(
            "trained model on {} records ({} iterations, error {:.6})",
            records.len(),
            report.iterations,
            report.error
        );

        Ok(TrainedModel { model, report })
    }
}

fn training_samples(records: &[PropertyRecord]) -> Result<Vec<NormalizedSample>> {
    if records.is_empty() {
        return Err(Error::DatasetLoad("dataset is empty".to_string()));
    }

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            codec::encode_sample(record)
                .map_err(|e| Error::DatasetLoad(format!("record {index}: {e}")))
        })
        .collect()
}
