//! Fixed scaling between natural units and the network's numeric space.
//!
//! The divisors are shared by every training and inference call. Changing
//! any of them invalidates every persisted model.

use crate::error::Result;
use crate::record::{PropertyFeatures, PropertyRecord};

pub const AREA_SCALE: f64 = 10_000.0;
pub const BEDROOMS_SCALE: f64 = 10.0;
pub const BATHROOMS_SCALE: f64 = 10.0;
pub const LOCATION_SCALE: f64 = 5.0;
pub const AGE_SCALE: f64 = 100.0;
/// Normalized output is the price in millions of currency units.
pub const PRICE_SCALE: f64 = 1_000_000.0;

pub const INPUT_WIDTH: usize = 5;

pub type NormalizedInput = [f64; INPUT_WIDTH];
pub type NormalizedOutput = f64;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSample {
    pub input: NormalizedInput,
    pub output: NormalizedOutput,
}

pub fn encode_input(features: &PropertyFeatures) -> Result<NormalizedInput> {
    features.validate()?;
    Ok([
        features.area / AREA_SCALE,
        features.bedrooms / BEDROOMS_SCALE,
        features.bathrooms / BATHROOMS_SCALE,
        features.location / LOCATION_SCALE,
        features.age / AGE_SCALE,
    ])
}

pub fn encode_output(price: f64) -> NormalizedOutput {
    price / PRICE_SCALE
}

pub fn decode_output(output: NormalizedOutput) -> f64 {
    output * PRICE_SCALE
}

pub fn encode_sample(record: &PropertyRecord) -> Result<NormalizedSample> {
    Ok(NormalizedSample {
        input: encode_input(&record.features())?,
        output: encode_output(record.price),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;

    fn features() -> PropertyFeatures {
        PropertyFeatures {
            area: 2000.0,
            bedrooms: 3.0,
            bathrooms: 2.0,
            location: 1.0,
            age: 5.0,
        }
    }

    #[test]
    fn input_is_divided_by_fixed_scales() {
        let input = encode_input(&features()).unwrap();
        assert_eq!(input, [0.2, 0.3, 0.2, 0.2, 0.05]);
    }

    #[test]
    fn output_decoding_inverts_encoding() {
        for price in [85_000.0, 300_000.0, 580_000.0, 1_234_567.89] {
            let back = decode_output(encode_output(price));
            assert!((back - price).abs() <= price * 1e-12, "{price} -> {back}");
        }
    }

    #[test]
    fn non_positive_area_is_rejected() {
        let mut bad = features();
        bad.area = -10.0;
        let err = encode_input(&bad).unwrap_err();
        assert_eq!(err.field(), Some(Field::Area));
    }

    #[test]
    fn nan_is_rejected() {
        let mut bad = features();
        bad.location = f64::NAN;
        assert_eq!(encode_input(&bad).unwrap_err().field(), Some(Field::Location));
    }
}
