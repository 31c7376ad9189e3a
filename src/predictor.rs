use std::collections::VecDeque;

use log::{debug, info};
use serde::Serialize;

use crate::codec;
use crate::error::Result;
use crate::nn::RegressionModel;
use crate::record::{PropertyFeatures, PropertyRecord, UserInput};

/// How many accepted inputs [`RecentInputs`] keeps.
pub const RECENT_INPUTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted_price: f64,
    /// Price of `nearest_record`, or 0 when the dataset is empty.
    pub nearest_actual_price: f64,
    pub nearest_record: Option<PropertyRecord>,
    /// Absolute-difference sum between the input and `nearest_record`.
    pub nearest_distance: Option<f64>,
}

/// Runs one prediction against a trained model and its dataset.
pub struct Predictor<'a> {
    model: &'a RegressionModel,
    dataset: &'a [PropertyRecord],
}

impl<'a> Predictor<'a> {
    pub fn new(model: &'a RegressionModel, dataset: &'a [PropertyRecord]) -> Self {
        Predictor { model, dataset }
    }

    pub fn predict(&self, input: &UserInput) -> Result<PredictionResult> {
        let features = input.parse()?;
        let normalized = codec::encode_input(&features)?;
        debug!("normalized input: {normalized:?}");

        let output = self.model.infer(&normalized)?;
        let predicted_price = codec::decode_output(output);

        let nearest = nearest_match(&features, self.dataset);
        let result = PredictionResult {
            predicted_price,
            nearest_actual_price: nearest.map_or(0.0, |(record, _)| record.price),
            nearest_record: nearest.map(|(record, _)| record.clone()),
            nearest_distance: nearest.map(|(_, distance)| distance),
        };

        info!(
            "predicted price {:.2}, nearest actual price {:.2}",
            result.predicted_price, result.nearest_actual_price
        );
        Ok(result)
    }
}

/// Linear scan for the record closest to `features` in natural units.
/// Ties go to the record that comes first.
pub fn nearest_match<'d>(
    features: &PropertyFeatures,
    dataset: &'d [PropertyRecord],
) -> Option<(&'d PropertyRecord, f64)> {
    let mut best: Option<(&PropertyRecord, f64)> = None;
    for record in dataset {
        let distance = features.distance(&record.features());
        match best {
            Some((_, closest)) if distance >= closest => (),
            _ => best = Some((record, distance)),
        }
    }
    best
}

/// Bounded log of the most recent accepted inputs, newest first.
#[derive(Debug, Clone, Default)]
pub struct RecentInputs {
    entries: VecDeque<UserInput>,
}

impl RecentInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, input: UserInput) {
        if self.entries.len() == RECENT_INPUTS {
            self.entries.pop_back();
        }
        self.entries.push_front(input);
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserInput> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::record::Field;

    fn record(area: f64, bedrooms: u32, price: f64) -> PropertyRecord {
        PropertyRecord {
            area,
            bedrooms,
            bathrooms: 2,
            location: 1,
            age: 10.0,
            price,
        }
    }

    fn features(area: f64, bedrooms: f64) -> PropertyFeatures {
        PropertyFeatures {
            area,
            bedrooms,
            bathrooms: 2.0,
            location: 1.0,
            age: 10.0,
        }
    }

    #[test]
    fn nearest_match_picks_smallest_distance() {
        let dataset = vec![
            record(1000.0, 2, 100_000.0),
            record(1900.0, 3, 250_000.0),
            record(3000.0, 4, 400_000.0),
        ];
        let (nearest, distance) = nearest_match(&features(2000.0, 3.0), &dataset).unwrap();
        assert_eq!(nearest.price, 250_000.0);
        assert_eq!(distance, 100.0);
    }

    #[test]
    fn nearest_match_tie_goes_to_first() {
        let dataset = vec![record(1900.0, 3, 1.0), record(2100.0, 3, 2.0)];
        let (nearest, _) = nearest_match(&features(2000.0, 3.0), &dataset).unwrap();
        assert_eq!(nearest.price, 1.0);
    }

    #[test]
    fn nearest_match_on_empty_dataset() {
        assert!(nearest_match(&features(2000.0, 3.0), &[]).is_none());
    }

    #[test]
    fn empty_dataset_gives_zero_actual_price() {
        let model = trained_model();
        let input = UserInput::from_values(2000.0, 3.0, 2.0, 1.0, 10.0);
        let result = Predictor::new(&model, &[]).predict(&input).unwrap();
        assert_eq!(result.nearest_actual_price, 0.0);
        assert_eq!(result.nearest_record, None);
        assert!(result.predicted_price.is_finite());
    }

    #[test]
    fn validation_runs_before_inference() {
        let model = RegressionModel::seeded(1);
        let input = UserInput::from_values(2000.0, 0.0, 2.0, 1.0, 10.0);
        let err = Predictor::new(&model, &[]).predict(&input).unwrap_err();
        assert_eq!(err.field(), Some(Field::Bedrooms));
    }

    #[test]
    fn untrained_model_is_reported() {
        let model = RegressionModel::seeded(1);
        let input = UserInput::from_values(2000.0, 3.0, 2.0, 1.0, 10.0);
        let err = Predictor::new(&model, &[]).predict(&input).unwrap_err();
        assert!(matches!(err, Error::NotTrained));
    }

    #[test]
    fn recent_inputs_keeps_newest_three() {
        let mut recent = RecentInputs::new();
        for area in [1.0, 2.0, 3.0, 4.0] {
            recent.push(UserInput::from_values(area, 1.0, 1.0, 1.0, 1.0));
        }
        let areas: Vec<&str> = recent.iter().filter_map(|i| i.area.as_deref()).collect();
        assert_eq!(areas, vec!["4", "3", "2"]);
        assert_eq!(recent.len(), RECENT_INPUTS);
    }

    fn trained_model() -> RegressionModel {
        let samples = vec![codec::encode_sample(&record(2000.0, 3, 300_000.0)).unwrap()];
        let mut model = RegressionModel::seeded(2);
        model.train(&samples).max_iterations(10).go().unwrap();
        model
    }
}
