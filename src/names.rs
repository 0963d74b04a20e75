//! Human readable names of reactions and metabolites.
use serde::Deserialize;

use std::collections::HashMap;
use std::io;
use std::path::Path;

use crate::model::ModelLp;
use crate::rates::DataError;

#[derive(Debug, Deserialize)]
struct NameRecord {
    id: String,
    name: String,
}

/// Lookup tables from reaction and metabolite ids to names.
///
/// Ids are matched as given, then with the SBML prefix (`R_`, `M_`) added or
/// removed, so tables written for either convention work.
#[derive(Clone, Debug, Default)]
pub struct NameTable {
    reactions: HashMap<String, String>,
    metabolites: HashMap<String, String>,
}

fn lookup<'a>(table: &'a HashMap<String, String>, prefix: &str, id: &str) -> Option<&'a str> {
    table
        .get(id)
        .or_else(|| table.get(&format!("{}{}", prefix, id)))
        .or_else(|| id.strip_prefix(prefix).and_then(|bare| table.get(bare)))
        .map(String::as_str)
}

fn read_records<R: io::Read>(reader: R) -> Result<HashMap<String, String>, DataError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut table = HashMap::new();
    for record in rdr.deserialize() {
        let NameRecord { id, name } = record?;
        table.insert(id, name);
    }
    Ok(table)
}

impl NameTable {
    /// Names declared in the SBML document; entities without a name are
    /// named by their id.
    pub fn from_model(model: &ModelLp) -> Self {
        NameTable {
            reactions: model
                .reactions
                .values()
                .map(|r| {
                    let name = r.name.clone().unwrap_or_else(|| r.id.to_owned());
                    (r.id.to_owned(), name)
                })
                .collect(),
            metabolites: model
                .metabolites
                .values()
                .map(|m| {
                    let name = m.name.clone().unwrap_or_else(|| m.id.to_owned());
                    (m.id.to_owned(), name)
                })
                .collect(),
        }
    }

    /// Read `id,name` tables for reactions and (optionally) metabolites.
    pub fn from_csv<P: AsRef<Path>>(
        reactions: P,
        metabolites: Option<P>,
    ) -> Result<Self, DataError> {
        let reactions = read_records(std::fs::File::open(reactions)?)?;
        let metabolites = match metabolites {
            Some(path) => read_records(std::fs::File::open(path)?)?,
            None => HashMap::new(),
        };
        Ok(NameTable {
            reactions,
            metabolites,
        })
    }

    /// Build from `id,name` CSV readers.
    pub fn from_readers<R: io::Read, M: io::Read>(
        reactions: R,
        metabolites: M,
    ) -> Result<Self, DataError> {
        Ok(NameTable {
            reactions: read_records(reactions)?,
            metabolites: read_records(metabolites)?,
        })
    }

    /// Name of a reaction
    pub fn reaction(&self, id: &str) -> Option<&str> {
        lookup(&self.reactions, "R_", id)
    }

    /// Name of a metabolite
    pub fn metabolite(&self, id: &str) -> Option<&str> {
        lookup(&self.metabolites, "M_", id)
    }
}
