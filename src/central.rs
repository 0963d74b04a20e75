//! Fluxes of a curated set of central-metabolism reactions.
use std::io;
use std::path::Path;

use crate::flux_analysis::{FluxError, FluxSolution};
use crate::rates::DataError;

/// One entry of the central metabolism table.
#[derive(Clone, Debug, PartialEq)]
pub struct CentralReaction {
    /// Label of the entry (first column of the table)
    pub label: String,
    /// Model reactions carrying this flux, summed when there are several;
    /// empty if the reaction has no counterpart in the model
    pub ids: Vec<String>,
}

/// Central metabolism reactions, in table order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CentralMap {
    /// Entries of the table
    pub reactions: Vec<CentralReaction>,
}

impl CentralMap {
    /// Parse a CSV with an `ID` column. Several model ids for one entry are
    /// separated by `", "`. The first non-`ID` column is used as label.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, DataError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        let id_col = headers
            .iter()
            .position(|h| h == "ID")
            .ok_or(DataError::MissingFeature {
                feature: String::from("ID"),
                condition: String::from("header"),
            })?;
        let label_col = (0..headers.len()).find(|&i| i != id_col);
        let mut reactions = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let ids = record.get(id_col).unwrap_or_default().trim();
            let label = match label_col.and_then(|i| record.get(i)) {
                Some(label) => label.to_owned(),
                None => row.to_string(),
            };
            reactions.push(CentralReaction {
                label,
                ids: if ids.is_empty() {
                    Vec::new()
                } else {
                    ids.split(", ").map(str::to_owned).collect()
                },
            });
        }
        Ok(CentralMap { reactions })
    }

    /// Read a CSV file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    /// Labels of the entries
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.reactions.iter().map(|r| r.label.as_str())
    }
}

/// Flux of every entry of `central_metabolism` in `solution`: 0 for entries
/// without model reactions, the sum of the parallel fluxes otherwise.
pub fn get_central_fluxes(
    central_metabolism: &CentralMap,
    solution: &FluxSolution,
) -> Result<Vec<f64>, FluxError> {
    central_metabolism
        .reactions
        .iter()
        .map(|entry| {
            entry
                .ids
                .iter()
                .map(|id| solution.flux(id))
                .sum::<Result<f64, FluxError>>()
        })
        .collect()
}
