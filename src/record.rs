use std::fmt;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static BUNDLED_DATASET: &str = include_str!("../data/real_estate_data.json");

/// Dataset prices are quoted in thousands of currency units.
const DATASET_PRICE_UNIT: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Area,
    Bedrooms,
    Bathrooms,
    Location,
    Age,
}

impl Field {
    /// Validation order for user input.
    pub const ALL: [Field; 5] = [
        Field::Area,
        Field::Bedrooms,
        Field::Bathrooms,
        Field::Location,
        Field::Age,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Area => "area",
            Field::Bedrooms => "bedrooms",
            Field::Bathrooms => "bathrooms",
            Field::Location => "location",
            Field::Age => "age",
        }
    }

    /// Location is a category code; sizes and counts may be fractional.
    fn must_be_whole(self) -> bool {
        matches!(self, Field::Location)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The five input features in their natural units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropertyFeatures {
    pub area: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub location: f64,
    pub age: f64,
}

impl PropertyFeatures {
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Area => self.area,
            Field::Bedrooms => self.bedrooms,
            Field::Bathrooms => self.bathrooms,
            Field::Location => self.location,
            Field::Age => self.age,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for field in Field::ALL {
            check_value(field, self.get(field))?;
        }
        Ok(())
    }

    /// Sum of absolute per-feature differences, in natural units.
    pub fn distance(&self, other: &PropertyFeatures) -> f64 {
        Field::ALL
            .iter()
            .map(|&field| (self.get(field) - other.get(field)).abs())
            .sum()
    }
}

fn check_value(field: Field, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::validation(field, "must be a finite number"));
    }
    if value <= 0.0 {
        return Err(Error::validation(field, "must be greater than zero"));
    }
    if field.must_be_whole() && value.fract() != 0.0 {
        return Err(Error::validation(field, "must be a whole number"));
    }
    Ok(())
}

/// One labeled row of the dataset. `price` is in whole currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub area: f64,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub location: u32,
    pub age: f64,
    pub price: f64,
}

impl PropertyRecord {
    pub fn features(&self) -> PropertyFeatures {
        PropertyFeatures {
            area: self.area,
            bedrooms: f64::from(self.bedrooms),
            bathrooms: f64::from(self.bathrooms),
            location: f64::from(self.location),
            age: self.age,
        }
    }
}

/// Row shape of the dataset file. Keys carry their units.
#[derive(Debug, Deserialize)]
struct DatasetRow {
    #[serde(rename = "Area (sq ft)")]
    area: f64,
    #[serde(rename = "Bedrooms")]
    bedrooms: f64,
    #[serde(rename = "Bathrooms")]
    bathrooms: f64,
    #[serde(rename = "Location")]
    location: f64,
    #[serde(rename = "Age of Property (years)")]
    age: f64,
    #[serde(rename = "Price (in $1000)")]
    price: f64,
}

impl DatasetRow {
    fn into_record(self, index: usize) -> Result<PropertyRecord> {
        let reject = |reason: String| Error::DatasetLoad(format!("record {index}: {reason}"));

        let whole = |value: f64, field: Field| -> Result<u32> {
            if value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value) {
                Ok(value as u32)
            } else {
                Err(reject(format!("{field} must be a whole number, got {value}")))
            }
        };

        let record = PropertyRecord {
            area: self.area,
            bedrooms: whole(self.bedrooms, Field::Bedrooms)?,
            bathrooms: whole(self.bathrooms, Field::Bathrooms)?,
            location: whole(self.location, Field::Location)?,
            age: self.age,
            price: self.price * DATASET_PRICE_UNIT,
        };

        record
            .features()
            .validate()
            .map_err(|e| reject(e.to_string()))?;
        if !(record.price.is_finite() && record.price > 0.0) {
            return Err(reject(format!("price must be positive, got {}", self.price)));
        }

        Ok(record)
    }
}

/// Parses a JSON array of dataset rows. An empty dataset is an error.
pub fn parse_dataset(json: &str) -> Result<Vec<PropertyRecord>> {
    let rows: Vec<DatasetRow> =
        serde_json::from_str(json).map_err(|e| Error::DatasetLoad(e.to_string()))?;

    if rows.is_empty() {
        return Err(Error::DatasetLoad("dataset is empty".to_string()));
    }

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| row.into_record(index))
        .collect()
}

pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<PropertyRecord>> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .map_err(|e| Error::DatasetLoad(format!("{}: {e}", path.display())))?;
    let records = parse_dataset(&json)?;
    info!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// The dataset shipped with the crate.
pub fn bundled_dataset() -> Result<Vec<PropertyRecord>> {
    parse_dataset(BUNDLED_DATASET)
}

/// Raw form values as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub area: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub location: Option<String>,
    pub age: Option<String>,
}

impl UserInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(area: f64, bedrooms: f64, bathrooms: f64, location: f64, age: f64) -> Self {
        UserInput::new()
            .set(Field::Area, area.to_string())
            .set(Field::Bedrooms, bedrooms.to_string())
            .set(Field::Bathrooms, bathrooms.to_string())
            .set(Field::Location, location.to_string())
            .set(Field::Age, age.to_string())
    }

    pub fn set(mut self, field: Field, value: impl Into<String>) -> Self {
        *self.slot(field) = Some(value.into());
        self
    }

    pub fn value(&self, field: Field) -> Option<&str> {
        match field {
            Field::Area => self.area.as_deref(),
            Field::Bedrooms => self.bedrooms.as_deref(),
            Field::Bathrooms => self.bathrooms.as_deref(),
            Field::Location => self.location.as_deref(),
            Field::Age => self.age.as_deref(),
        }
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Area => &mut self.area,
            Field::Bedrooms => &mut self.bedrooms,
            Field::Bathrooms => &mut self.bathrooms,
            Field::Location => &mut self.location,
            Field::Age => &mut self.age,
        }
    }

    /// Checks fields in form order and reports the first bad one.
    pub fn parse(&self) -> Result<PropertyFeatures> {
        let mut values = [0.0; 5];

        for (slot, field) in values.iter_mut().zip(Field::ALL) {
            let text = self
                .value(field)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .ok_or_else(|| Error::validation(field, "is required"))?;
            let value: f64 = text
                .parse()
                .map_err(|_| Error::validation(field, format!("is not a number: {text:?}")))?;
            check_value(field, value)?;
            *slot = value;
        }

        let [area, bedrooms, bathrooms, location, age] = values;
        Ok(PropertyFeatures {
            area,
            bedrooms,
            bathrooms,
            location,
            age,
        })
    }
}
