//! Experimental uptake/secretion rates and how they become reaction bounds.
use custom_error::custom_error;
use indexmap::IndexMap;
use rand::Rng;
use serde::Deserialize;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

custom_error! {
    /// Error while reading tabular data
    pub DataError
    /// File could not be opened
    Io{/// underlying error
        source: io::Error} = "{source}",
    /// Malformed CSV
    Csv{/// underlying error
        source: csv::Error} = "{source}",
    /// A table cell is not a number
    NotANumber{/// row
        row: String, /// column
        column: String, /// cell content
        value: String} = "value '{value}' in row {row}, column {column} is not a number",
    /// A condition is not in the table
    MissingCondition{/// condition name
        condition: String} = "condition '{condition}' is not in the rate table",
    /// A feature (rate) is not in the table
    MissingFeature{/// feature name
        feature: String, /// condition name
        condition: String} = "no value for '{feature}' in condition '{condition}'",
    /// Unknown bound mode
    UnknownMode{/// given mode
        mode: String} = "unknown bound mode '{mode}', expected mean, mean_sd or sampled",
    /// A table has no columns
    EmptyTable = "the table has no header"
}

/// How measured rates are turned into reaction bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundMode {
    /// lower = upper = mean
    #[default]
    Mean,
    /// [mean - sd, mean + sd]
    MeanSd,
    /// two uniform draws from [mean - 2sd, mean + 2sd], sorted
    Sampled,
}

impl FromStr for BoundMode {
    type Err = DataError;

    fn from_str(mode: &str) -> Result<Self, DataError> {
        match mode {
            "mean" => Ok(BoundMode::Mean),
            "mean_sd" => Ok(BoundMode::MeanSd),
            "sampled" => Ok(BoundMode::Sampled),
            _ => Err(DataError::UnknownMode {
                mode: mode.to_owned(),
            }),
        }
    }
}

impl fmt::Display for BoundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoundMode::Mean => "mean",
            BoundMode::MeanSd => "mean_sd",
            BoundMode::Sampled => "sampled",
        })
    }
}

impl BoundMode {
    /// Lower and upper bound for a rate measured as `mean` ± `sd`.
    pub fn bounds<R: Rng>(self, mean: f64, sd: f64, rng: &mut R) -> (f64, f64) {
        match self {
            BoundMode::Mean => (mean, mean),
            BoundMode::MeanSd => (mean - sd.abs(), mean + sd.abs()),
            BoundMode::Sampled => {
                let spread = 2. * sd.abs();
                let (low, high) = (mean - spread, mean + spread);
                let first = rng.gen_range(low..=high);
                let second = rng.gen_range(low..=high);
                if first <= second {
                    (first, second)
                } else {
                    (second, first)
                }
            }
        }
    }
}

/// Reaction id to the name of the rate that constrains it.
#[derive(Clone, Debug, PartialEq)]
pub struct RateMap(IndexMap<String, String>);

impl Default for RateMap {
    /// Exchange reactions measured in the cultivation data sets.
    fn default() -> Self {
        [
            ("67", "q_MSG"),
            ("96", "q_Glc"),
            ("132", "q_Trehalose"),
            ("47", "q_Lactate"),
            ("106", "q_EtOH"),
            ("104", "q_Citrate"),
            ("54", "q_Alanine"),
            ("60", "q_Arginine"),
            ("62", "q_Asparagine"),
            ("63", "q_Aspartate"),
            ("69", "q_Histidine"),
            ("71", "q_Isoleucine"),
            ("73", "q_Leucine"),
            ("75", "q_Methionine"),
            ("77", "q_Phenylalanine"),
            ("79", "q_Proline"),
            ("80", "q_Serine"),
            ("82", "q_Threonine"),
            ("84", "q_Valine"),
            ("108", "q_Glycine"),
            ("992", "q_Lysine"),
        ]
        .iter()
        .map(|(rxn, rate)| (rxn.to_string(), rate.to_string()))
        .collect()
    }
}

impl FromIterator<(String, String)> for RateMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        RateMap(iter.into_iter().collect())
    }
}

impl RateMap {
    /// Map without entries
    pub fn empty() -> Self {
        RateMap(IndexMap::new())
    }

    /// Add or replace the rate of a reaction
    pub fn insert(&mut self, reaction: &str, rate: &str) {
        self.0.insert(reaction.to_owned(), rate.to_owned());
    }

    /// Iterate over (reaction id, rate name)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reaction constrained by a rate
    pub fn reaction_for(&self, rate: &str) -> Option<&str> {
        self.iter().find(|(_, r)| *r == rate).map(|(rxn, _)| rxn)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rows are conditions, columns are features (rates, growth, ...). Missing
/// cells (empty in the CSV) are absent from the row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    /// Feature names, in column order
    pub features: Vec<String>,
    /// Condition name to its measured features
    pub rows: IndexMap<String, HashMap<String, f64>>,
}

impl Table {
    /// Parse a CSV whose first column holds the condition names.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, DataError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        if headers.is_empty() {
            return Err(DataError::EmptyTable);
        }
        let features: Vec<String> = headers.iter().skip(1).map(str::to_owned).collect();
        let mut rows = IndexMap::new();
        for record in rdr.records() {
            let record = record?;
            let condition = record.get(0).unwrap_or_default().to_owned();
            let mut row = HashMap::with_capacity(features.len());
            for (feature, cell) in features.iter().zip(record.iter().skip(1)) {
                let cell = cell.trim();
                if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
                    continue;
                }
                // `inf` parses as f64 but cannot bound a flux
                let value = cell
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| DataError::NotANumber {
                        row: condition.to_owned(),
                        column: feature.to_owned(),
                        value: cell.to_owned(),
                    })?;
                row.insert(feature.to_owned(), value);
            }
            rows.insert(condition, row);
        }
        Ok(Table { features, rows })
    }

    /// Read a CSV file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    /// Value of a feature in a condition
    pub fn get(&self, feature: &str, condition: &str) -> Result<f64, DataError> {
        self.rows
            .get(condition)
            .ok_or(DataError::MissingCondition {
                condition: condition.to_owned(),
            })?
            .get(feature)
            .copied()
            .ok_or(DataError::MissingFeature {
                feature: feature.to_owned(),
                condition: condition.to_owned(),
            })
    }
}

/// Mean and standard deviation of the measured rates of one condition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionRates {
    /// Mean of each measured rate
    pub mean: HashMap<String, f64>,
    /// Standard deviation of each measured rate
    pub sd: HashMap<String, f64>,
}

impl ConditionRates {
    /// Mean and SD of a rate, if both were measured.
    pub fn get(&self, rate: &str) -> Option<(f64, f64)> {
        Some((*self.mean.get(rate)?, *self.sd.get(rate)?))
    }
}

/// Experimental rates of every condition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Measurements {
    /// Mean values
    pub mean: Table,
    /// Standard deviations
    pub sd: Table,
}

impl Measurements {
    /// Read the mean and SD tables
    pub fn from_paths<P: AsRef<Path>>(mean: P, sd: P) -> Result<Self, DataError> {
        Ok(Measurements {
            mean: Table::from_path(mean)?,
            sd: Table::from_path(sd)?,
        })
    }

    /// Conditions of the mean table, in file order
    pub fn conditions(&self) -> impl Iterator<Item = &str> {
        self.mean.rows.keys().map(String::as_str)
    }

    /// Rates of one condition
    pub fn condition(&self, condition: &str) -> Result<ConditionRates, DataError> {
        let missing = || DataError::MissingCondition {
            condition: condition.to_owned(),
        };
        Ok(ConditionRates {
            mean: self.mean.rows.get(condition).ok_or_else(missing)?.clone(),
            sd: self.sd.rows.get(condition).ok_or_else(missing)?.clone(),
        })
    }

    /// Mean of a feature in a condition
    pub fn mean(&self, feature: &str, condition: &str) -> Result<f64, DataError> {
        self.mean.get(feature, condition)
    }

    /// SD of a feature in a condition
    pub fn sd(&self, feature: &str, condition: &str) -> Result<f64, DataError> {
        self.sd.get(feature, condition)
    }
}
