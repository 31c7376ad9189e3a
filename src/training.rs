use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::codec::NormalizedSample;
use crate::error::{Error, Result};
use crate::nn::RegressionModel;

pub const DEFAULT_LEARNING_RATE: f64 = 0.3;
pub const DEFAULT_MOMENTUM: f64 = 0.1;
pub const DEFAULT_MAX_ITERATIONS: u32 = 3000;
pub const DEFAULT_ERROR_THRESHOLD: f64 = 0.005;

/// Error measured after a completed iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub iteration: u32,
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub iterations: u32,
    /// Mean squared error over the training set after the last iteration.
    pub error: f64,
    /// Whether the error threshold was reached before the iteration cap.
    pub converged: bool,
    pub checkpoints: Vec<Checkpoint>,
}

/// A configured training run over a fixed set of samples.
///
/// Each iteration is one pass of per-sample backpropagation over every
/// sample. The run stops when the mean squared error drops below the error
/// threshold or when the iteration cap is reached, whichever comes first.
pub struct Training<'a> {
    model: &'a mut RegressionModel,
    samples: &'a [NormalizedSample],
    learning_rate: f64,
    momentum: f64,
    max_iterations: u32,
    error_threshold: f64,
    log_interval: Option<u32>,
    checkpoint_interval: Option<u32>,
}

impl<'a> Training<'a> {
    pub(crate) fn new(model: &'a mut RegressionModel, samples: &'a [NormalizedSample]) -> Self {
        Training {
            model,
            samples,
            learning_rate: DEFAULT_LEARNING_RATE,
            momentum: DEFAULT_MOMENTUM,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            log_interval: None,
            checkpoint_interval: None,
        }
    }

    pub fn rate(&mut self, rate: f64) -> &mut Training<'a> {
        self.learning_rate = rate;
        self
    }

    pub fn momentum(&mut self, momentum: f64) -> &mut Training<'a> {
        self.momentum = momentum;
        self
    }

    pub fn max_iterations(&mut self, iterations: u32) -> &mut Training<'a> {
        self.max_iterations = iterations;
        self
    }

    pub fn error_threshold(&mut self, threshold: f64) -> &mut Training<'a> {
        self.error_threshold = threshold;
        self
    }

    pub fn log_interval(&mut self, log_interval: Option<u32>) -> &mut Training<'a> {
        self.log_interval = log_interval;
        self
    }

    /// Records the error every `interval` iterations in the report.
    pub fn checkpoint_interval(&mut self, interval: Option<u32>) -> &mut Training<'a> {
        self.checkpoint_interval = interval;
        self
    }

    fn check(&self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(Error::InvalidConfig("no training samples".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.momentum >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "momentum must be >= 0, got {}",
                self.momentum
            )));
        }
        if self.max_iterations < 1 {
            return Err(Error::InvalidConfig(
                "must train for at least one iteration".to_string(),
            ));
        }
        if !(self.error_threshold > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "error threshold must be > 0, got {}",
                self.error_threshold
            )));
        }
        if matches!(self.log_interval, Some(0)) || matches!(self.checkpoint_interval, Some(0)) {
            return Err(Error::InvalidConfig(
                "intervals must be positive or None".to_string(),
            ));
        }

        let width = self.model.layers()[0];
        if let Some(sample) = self.samples.iter().find(|s| s.input.len() != width) {
            return Err(Error::InvalidModel(format!(
                "sample has {} inputs, model expects {width}",
                sample.input.len()
            )));
        }
        Ok(())
    }

    pub fn go(&mut self) -> Result<TrainingReport> {
        self.check()?;

        info!(
            "training on {} samples (rate {}, momentum {}, max {} iterations, threshold {})",
            self.samples.len(),
            self.learning_rate,
            self.momentum,
            self.max_iterations,
            self.error_threshold
        );

        let mut velocity = self.model.zero_velocity();
        let mut checkpoints = Vec::new();
        let mut error = f64::INFINITY;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            for sample in self.samples {
                let activations = self.model.forward(&sample.input);
                self.model.backward(
                    &activations,
                    sample.output,
                    self.learning_rate,
                    self.momentum,
                    &mut velocity,
                );
            }

            error = self.model.mean_squared_error(self.samples);
            iterations += 1;

            if !error.is_finite() {
                return Err(Error::Training(format!(
                    "diverged at iteration {iterations}"
                )));
            }

            match self.log_interval {
                Some(interval) if iterations % interval == 0 => {
                    info!("iterations: {iterations}; error: {error:.6}");
                }
                _ => (),
            }
            match self.checkpoint_interval {
                Some(interval) if iterations % interval == 0 => {
                    checkpoints.push(Checkpoint {
                        iteration: iterations,
                        error,
                    });
                }
                _ => (),
            }

            if error < self.error_threshold {
                break;
            }
        }

        let converged = error < self.error_threshold;
        self.model.mark_trained();
        info!("training finished after {iterations} iterations with error {error:.6}");
        debug!("converged: {converged}");

        Ok(TrainingReport {
            iterations,
            error,
            converged,
            checkpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<NormalizedSample> {
        vec![
            NormalizedSample {
                input: [0.2, 0.3, 0.2, 0.2, 0.05],
                output: 0.3,
            },
            NormalizedSample {
                input: [0.12, 0.2, 0.1, 0.6, 0.35],
                output: 0.13,
            },
            NormalizedSample {
                input: [0.32, 0.5, 0.4, 0.2, 0.01],
                output: 0.54,
            },
        ]
    }

    #[test]
    fn stops_at_iteration_cap() {
        let samples = samples();
        let mut model = RegressionModel::seeded(3);
        let report = model
            .train(&samples)
            .max_iterations(5)
            .error_threshold(1e-12)
            .go()
            .unwrap();
        assert_eq!(report.iterations, 5);
        assert!(!report.converged);
        assert!(model.is_trained());
    }

    #[test]
    fn stops_once_below_threshold() {
        let samples = samples();
        let mut model = RegressionModel::seeded(3);
        let report = model.train(&samples).error_threshold(0.5).go().unwrap();
        assert!(report.converged);
        assert!(report.error < 0.5);
        assert!(report.iterations < DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn report_error_matches_final_weights() {
        let samples = samples();
        let mut model = RegressionModel::seeded(11);
        let report = model.train(&samples).max_iterations(50).go().unwrap();
        assert_eq!(report.error, model.mean_squared_error(&samples));
    }

    #[test]
    fn checkpoints_follow_interval() {
        let samples = samples();
        let mut model = RegressionModel::seeded(5);
        let report = model
            .train(&samples)
            .max_iterations(30)
            .error_threshold(1e-12)
            .checkpoint_interval(Some(10))
            .go()
            .unwrap();
        let at: Vec<u32> = report.checkpoints.iter().map(|c| c.iteration).collect();
        assert_eq!(at, vec![10, 20, 30]);
    }

    #[test]
    fn divergence_is_a_training_error() {
        let samples = samples();
        let mut model = RegressionModel::seeded(8);
        model.activation(crate::nn::ActivationFunction::LeakyReLU);
        let result = model
            .train(&samples)
            .rate(1e200)
            .momentum(0.0)
            .max_iterations(20)
            .error_threshold(1e-12)
            .go();
        assert!(matches!(result, Err(Error::Training(_))));
        assert!(!model.is_trained());
    }

    #[test]
    fn rejects_bad_settings() {
        let samples = samples();
        let mut model = RegressionModel::seeded(5);
        assert!(matches!(
            model.train(&samples).rate(0.0).go(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            model.train(&samples).momentum(-0.1).go(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            model.train(&samples).max_iterations(0).go(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            model.train(&samples).log_interval(Some(0)).go(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(model.train(&[]).go(), Err(Error::InvalidConfig(_))));
        assert!(!model.is_trained());
    }
}
