use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::codec::{NormalizedInput, NormalizedOutput, NormalizedSample, INPUT_WIDTH};
use crate::error::{Error, Result};
use crate::training::Training;

/// Input, two hidden layers, one price output.
pub const TOPOLOGY: [usize; 4] = [INPUT_WIDTH, 5, 3, 1];

const BIAS_STD_DEV: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFunction {
    #[default]
    #[serde(rename = "sigmoid")]
    Sigmoid,
    #[serde(rename = "tanh")]
    TanH,
    #[serde(rename = "relu")]
    ReLU,
    #[serde(rename = "leaky_relu")]
    LeakyReLU,
}

impl ActivationFunction {
    fn apply(self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1f64 / (1f64 + (-x).exp()),
            ActivationFunction::TanH => x.tanh(),
            ActivationFunction::ReLU => x.max(0.0),
            ActivationFunction::LeakyReLU => {
                if x > 0.0 {
                    x
                } else {
                    0.01 * x
                }
            }
        }
    }

    /// Derivative expressed in terms of the activated output `y`.
    fn derivative(self, y: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => y * (1f64 - y),
            ActivationFunction::TanH => 1.0 - y.powi(2),
            ActivationFunction::ReLU => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            ActivationFunction::LeakyReLU => {
                if y > 0.0 {
                    1.0
                } else {
                    0.01
                }
            }
        }
    }
}

/// Serializable state of a trained network.
///
/// `weights[l][j][i]` connects neuron `i` of layer `l` to neuron `j` of
/// layer `l + 1`; `biases[l][j]` belongs to that same neuron `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub layers: Vec<usize>,
    pub activation: ActivationFunction,
    pub weights: Vec<Vec<Vec<f64>>>,
    pub biases: Vec<Vec<f64>>,
}

impl ModelSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn check(&self) -> Result<()> {
        if self.layers.len() < 2 {
            return Err(Error::InvalidModel(format!(
                "need at least an input and an output layer, got {:?}",
                self.layers
            )));
        }
        if self.layers.contains(&0) {
            return Err(Error::InvalidModel(format!("empty layer in {:?}", self.layers)));
        }
        let (input, output) = (self.layers[0], self.layers[self.layers.len() - 1]);
        if input != INPUT_WIDTH || output != 1 {
            return Err(Error::InvalidModel(format!(
                "expected {INPUT_WIDTH} inputs and 1 output, got {:?}",
                self.layers
            )));
        }
        if self.weights.len() != self.layers.len() - 1 || self.biases.len() != self.weights.len() {
            return Err(Error::InvalidModel(format!(
                "{} weight and {} bias layers for topology {:?}",
                self.weights.len(),
                self.biases.len(),
                self.layers
            )));
        }

        for (l, pair) in self.layers.windows(2).enumerate() {
            let (fan_in, width) = (pair[0], pair[1]);
            let rows_ok = self.weights[l].len() == width
                && self.weights[l].iter().all(|row| row.len() == fan_in);
            if !rows_ok || self.biases[l].len() != width {
                return Err(Error::InvalidModel(format!(
                    "layer {} does not match shape {fan_in}x{width}",
                    l + 1
                )));
            }
        }

        let all_finite = self
            .weights
            .iter()
            .flatten()
            .flatten()
            .chain(self.biases.iter().flatten())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidModel("non-finite parameter".to_string()));
        }

        Ok(())
    }
}

/// Per-layer activations of one forward pass; index 0 is the input.
pub(crate) type Activations = Vec<Vec<f64>>;

/// Feed-forward regression network.
#[derive(Debug, Clone)]
pub struct RegressionModel {
    layers: Vec<usize>,
    weights: Vec<Vec<Vec<f64>>>,
    biases: Vec<Vec<f64>>,
    activation: ActivationFunction,
    trained: bool,
}

impl RegressionModel {
    /// A fresh, untrained network with the house-price topology.
    pub fn new() -> Self {
        Self::with_rng(&mut StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(&mut StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut model = RegressionModel {
            layers: TOPOLOGY.to_vec(),
            weights: vec![],
            biases: vec![],
            activation: ActivationFunction::default(),
            trained: false,
        };
        model.generate_weights(rng);
        model
    }

    pub fn activation(&mut self, activation: ActivationFunction) -> &mut RegressionModel {
        self.activation = activation;
        self
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    /// Xavier-scaled normal weights, small normal biases.
    fn generate_weights<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.weights = self
            .layers
            .windows(2)
            .map(|pair| {
                let std_dev = (1.0 / pair[0] as f64).sqrt();
                (0..pair[1])
                    .map(|_| {
                        (0..pair[0])
                            .map(|_| std_dev * rng.sample::<f64, _>(StandardNormal))
                            .collect()
                    })
                    .collect()
            })
            .collect();

        self.biases = self
            .layers
            .iter()
            .skip(1)
            .map(|&width| {
                (0..width)
                    .map(|_| BIAS_STD_DEV * rng.sample::<f64, _>(StandardNormal))
                    .collect()
            })
            .collect();
    }

    pub(crate) fn forward(&self, input: &[f64]) -> Activations {
        let activation = self.activation;
        let mut activations: Activations = Vec::with_capacity(self.layers.len());
        activations.push(input.to_vec());

        for (weights, biases) in self.weights.iter().zip(&self.biases) {
            let previous = &activations[activations.len() - 1];
            let outputs = weights
                .iter()
                .zip(biases)
                .map(|(row, &bias)| activation.apply(dot_product(previous, row) + bias))
                .collect();
            activations.push(outputs);
        }

        activations
    }

    /// One backpropagation step on a single sample.
    pub(crate) fn backward(
        &mut self,
        activations: &Activations,
        target: f64,
        learning_rate: f64,
        momentum: f64,
        velocity: &mut Velocity,
    ) {
        let activation = self.activation;
        let depth = self.weights.len();

        // deltas[l] belongs to the neurons fed by weights[l]
        let mut deltas: Vec<Vec<f64>> = vec![vec![]; depth];
        deltas[depth - 1] = activations[depth]
            .iter()
            .map(|&y| (target - y) * activation.derivative(y))
            .collect();

        for l in (0..depth - 1).rev() {
            let next_weights = &self.weights[l + 1];
            let next_delta = &deltas[l + 1];
            let delta = activations[l + 1]
                .iter()
                .enumerate()
                .map(|(j, &y)| {
                    let sum: f64 = next_delta
                        .iter()
                        .zip(next_weights)
                        .map(|(&delta, row)| delta * row[j])
                        .sum();
                    sum * activation.derivative(y)
                })
                .collect();
            deltas[l] = delta;
        }

        for (l, delta) in deltas.iter().enumerate() {
            let inputs = &activations[l];
            for (j, row) in self.weights[l].iter_mut().enumerate() {
                for ((w, &input), change) in row
                    .iter_mut()
                    .zip(inputs)
                    .zip(velocity.weights[l][j].iter_mut())
                {
                    let delta_w = learning_rate * delta[j] * input + momentum * *change;
                    *w += delta_w;
                    *change = delta_w;
                }

                let delta_b = learning_rate * delta[j] + momentum * velocity.biases[l][j];
                self.biases[l][j] += delta_b;
                velocity.biases[l][j] = delta_b;
            }
        }
    }

    pub(crate) fn output_of(activations: &Activations) -> Option<f64> {
        activations.last().and_then(|out| out.first()).copied()
    }

    /// Mean squared error over `samples` with the current weights.
    pub fn mean_squared_error(&self, samples: &[NormalizedSample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let total: f64 = samples
            .iter()
            .map(|sample| {
                let output = Self::output_of(&self.forward(&sample.input)).unwrap_or(f64::NAN);
                (sample.output - output).powi(2)
            })
            .sum();
        total / samples.len() as f64
    }

    /// Starts a training run over `samples`; see [`Training`].
    pub fn train<'a>(&'a mut self, samples: &'a [NormalizedSample]) -> Training<'a> {
        Training::new(self, samples)
    }

    pub(crate) fn mark_trained(&mut self) {
        self.trained = true;
    }

    pub(crate) fn zero_velocity(&self) -> Velocity {
        Velocity {
            weights: self
                .weights
                .iter()
                .map(|layer| layer.iter().map(|row| vec![0.0; row.len()]).collect())
                .collect(),
            biases: self.biases.iter().map(|layer| vec![0.0; layer.len()]).collect(),
        }
    }

    /// Forward pass on a normalized input. Never mutates the model.
    pub fn infer(&self, input: &NormalizedInput) -> Result<NormalizedOutput> {
        if !self.trained {
            return Err(Error::NotTrained);
        }
        if self.layers[0] != input.len() {
            return Err(Error::InvalidModel(format!(
                "model expects {} inputs, got {}",
                self.layers[0],
                input.len()
            )));
        }

        match Self::output_of(&self.forward(input)) {
            Some(output) if output.is_finite() => Ok(output),
            Some(output) => Err(Error::Inference(format!("model produced {output}"))),
            None => Err(Error::Inference("model produced no output".to_string())),
        }
    }

    pub fn serialize(&self) -> Result<ModelSnapshot> {
        if !self.trained {
            return Err(Error::NotTrained);
        }
        Ok(ModelSnapshot {
            layers: self.layers.clone(),
            activation: self.activation,
            weights: self.weights.clone(),
            biases: self.biases.clone(),
        })
    }

    pub fn deserialize(snapshot: ModelSnapshot) -> Result<Self> {
        snapshot.check()?;
        Ok(RegressionModel {
            layers: snapshot.layers,
            weights: snapshot.weights,
            biases: snapshot.biases,
            activation: snapshot.activation,
            trained: true,
        })
    }
}

impl Default for RegressionModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Previous parameter changes, carried between steps for momentum.
pub(crate) struct Velocity {
    weights: Vec<Vec<Vec<f64>>>,
    biases: Vec<Vec<f64>>,
}

fn dot_product(first: &[f64], second: &[f64]) -> f64 {
    first.iter().zip(second).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained_model() -> RegressionModel {
        let samples = vec![
            NormalizedSample {
                input: [0.2, 0.3, 0.2, 0.2, 0.05],
                output: 0.3,
            },
            NormalizedSample {
                input: [0.15, 0.2, 0.1, 0.4, 0.2],
                output: 0.21,
            },
        ];
        let mut model = RegressionModel::seeded(7);
        model.train(&samples).max_iterations(200).go().unwrap();
        model
    }

    #[test]
    fn untrained_model_refuses_inference() {
        let model = RegressionModel::seeded(1);
        assert!(matches!(model.infer(&[0.1; 5]), Err(Error::NotTrained)));
        assert!(matches!(model.serialize(), Err(Error::NotTrained)));
    }

    #[test]
    fn new_model_has_house_price_topology() {
        let model = RegressionModel::seeded(1);
        assert_eq!(model.layers(), &[5, 5, 3, 1]);
        let activations = model.forward(&[0.1; 5]);
        let widths: Vec<usize> = activations.iter().map(Vec::len).collect();
        assert_eq!(widths, vec![5, 5, 3, 1]);
    }

    #[test]
    fn same_seed_same_weights() {
        let a = RegressionModel::seeded(42);
        let b = RegressionModel::seeded(42);
        assert_eq!(a.forward(&[0.3; 5]), b.forward(&[0.3; 5]));
    }

    #[test]
    fn snapshot_round_trip_preserves_inference() {
        let model = trained_model();
        let json = model.serialize().unwrap().to_json().unwrap();
        let restored = RegressionModel::deserialize(ModelSnapshot::from_json(&json).unwrap()).unwrap();

        for input in [[0.2, 0.3, 0.2, 0.2, 0.05], [0.5, 0.1, 0.1, 0.6, 0.9]] {
            assert_eq!(model.infer(&input).unwrap(), restored.infer(&input).unwrap());
        }
    }

    #[test]
    fn inference_from_several_threads() {
        let model = trained_model();
        let expected = model.infer(&[0.2, 0.3, 0.2, 0.2, 0.05]).unwrap();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let output = model.infer(&[0.2, 0.3, 0.2, 0.2, 0.05]).unwrap();
                    assert_eq!(output, expected);
                });
            }
        });
    }

    #[test]
    fn inconsistent_snapshot_is_rejected() {
        let mut snapshot = trained_model().serialize().unwrap();
        snapshot.weights[1].pop();
        assert!(matches!(
            RegressionModel::deserialize(snapshot),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn snapshot_with_wrong_widths_is_rejected() {
        let narrow_input = ModelSnapshot {
            layers: vec![2, 1],
            activation: ActivationFunction::Sigmoid,
            weights: vec![vec![vec![0.5, 0.5]]],
            biases: vec![vec![0.0]],
        };
        assert!(matches!(
            RegressionModel::deserialize(narrow_input),
            Err(Error::InvalidModel(_))
        ));

        let wide_output = ModelSnapshot {
            layers: vec![5, 3],
            activation: ActivationFunction::Sigmoid,
            weights: vec![vec![vec![0.1; 5]; 3]],
            biases: vec![vec![0.0; 3]],
        };
        assert!(matches!(
            RegressionModel::deserialize(wide_output),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn overflowing_output_is_an_inference_error() {
        let snapshot = ModelSnapshot {
            layers: vec![5, 1],
            activation: ActivationFunction::ReLU,
            weights: vec![vec![vec![f64::MAX; 5]]],
            biases: vec![vec![0.0]],
        };
        let model = RegressionModel::deserialize(snapshot).unwrap();
        assert!(matches!(model.infer(&[1.0; 5]), Err(Error::Inference(_))));
    }

    #[test]
    fn non_finite_snapshot_is_rejected() {
        let mut snapshot = trained_model().serialize().unwrap();
        snapshot.biases[0][0] = f64::INFINITY;
        assert!(RegressionModel::deserialize(snapshot).is_err());
    }

    #[test]
    fn snapshot_records_activation() {
        let mut model = trained_model();
        model.activation(ActivationFunction::TanH);
        let snapshot = model.serialize().unwrap();
        assert_eq!(snapshot.activation, ActivationFunction::TanH);
        assert!(snapshot.to_json().unwrap().contains("\"tanh\""));
    }
}
