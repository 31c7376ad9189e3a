use log::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::nn::RegressionModel;
use crate::predictor::{PredictionResult, Predictor, RecentInputs};
use crate::record::{PropertyRecord, UserInput};
use crate::store::ModelStore;
use crate::trainer::Trainer;
use crate::training::TrainingReport;

/// Where the ready model came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// A model was already in memory; nothing was done.
    Ready,
    Restored,
    Trained(TrainingReport),
}

/// Restore-or-train lifecycle plus prediction, for an event-driven shell.
///
/// All work runs synchronously on the caller's thread; training blocks
/// until it finishes.
pub struct Pipeline<S> {
    dataset: Vec<PropertyRecord>,
    store: S,
    trainer: Trainer,
    model: Option<RegressionModel>,
    recent: RecentInputs,
}

impl<S: ModelStore> Pipeline<S> {
    pub fn new(dataset: Vec<PropertyRecord>, store: S, config: PipelineConfig) -> Self {
        Pipeline {
            dataset,
            store,
            trainer: Trainer::new(config),
            model: None,
            recent: RecentInputs::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn dataset(&self) -> &[PropertyRecord] {
        &self.dataset
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn model(&self) -> Option<&RegressionModel> {
        self.model.as_ref()
    }

    /// Restores the stored model, or trains and stores a new one.
    ///
    /// A stored model that cannot be restored is discarded and replaced.
    pub fn ensure_model_ready(&mut self) -> Result<ModelSource> {
        if self.model.is_some() {
            return Ok(ModelSource::Ready);
        }

        match self.restore() {
            Ok(Some(model)) => {
                info!("restored model from store");
                self.model = Some(model);
                return Ok(ModelSource::Restored);
            }
            Ok(None) => (),
            Err(e) => {
                warn!("discarding stored model: {e}");
                self.store.clear()?;
            }
        }

        let trained = self
            .trainer
            .train_from_dataset(&self.dataset, &mut self.store)?;
        self.model = Some(trained.model);
        Ok(ModelSource::Trained(trained.report))
    }

    fn restore(&self) -> Result<Option<RegressionModel>> {
        self.store
            .load()?
            .map(RegressionModel::deserialize)
            .transpose()
    }

    /// Fails with [`Error::NotTrained`] until a model is ready.
    pub fn predict(&mut self, input: &UserInput) -> Result<PredictionResult> {
        let model = self.model.as_ref().ok_or(Error::NotTrained)?;
        let result = Predictor::new(model, &self.dataset).predict(input)?;
        self.recent.push(input.clone());
        Ok(result)
    }

    /// Forgets the model; the next `ensure_model_ready` retrains.
    pub fn clear_model(&mut self) -> Result<()> {
        self.store.clear()?;
        self.model = None;
        info!("model cleared, retraining on next start");
        Ok(())
    }

    pub fn recent_inputs(&self) -> &RecentInputs {
        &self.recent
    }
}
