//! TOML description of a simulation run.
use custom_error::custom_error;
use serde::Deserialize;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::rates::{BoundMode, RateMap};

custom_error! {
    /// Error while loading a run configuration
    pub ConfigError
    /// File could not be read
    Io{/// underlying error
        source: std::io::Error} = "could not read configuration: {source}",
    /// File is not valid TOML or misses fields
    Toml{/// underlying error
        source: toml::de::Error} = "invalid configuration: {source}",
    /// Values out of range
    Invalid{/// what is wrong
        msg: String} = "invalid configuration: {msg}"
}

fn default_samples() -> usize {
    1000
}

fn default_seed() -> u64 {
    42
}

fn default_fraction() -> f64 {
    1.
}

fn default_output() -> PathBuf {
    PathBuf::from("results")
}

/// A reaction whose sampled fluxes are plotted against a measured feature.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PlotConfig {
    /// Column of the measurement tables
    pub feature: String,
    /// Reaction carrying that flux in the model
    pub reaction: String,
    /// Y axis label; the feature name when absent
    pub ylabel: Option<String>,
}

/// Everything needed to simulate a set of cultivation conditions.
///
/// ```toml
/// model = "model.xml"
/// mean = "rates_mean.csv"
/// sd = "rates_sd.csv"
/// mode = "sampled"
/// samples = 500
///
/// [rates]
/// "EX_pyr_e" = "q_Pyruvate"
///
/// [[plots]]
/// feature = "q_Glc"
/// reaction = "96"
/// ylabel = "glucose uptake [mmol/gDW/h]"
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RunConfig {
    /// SBML model
    pub model: PathBuf,
    /// CSV with the mean rates, conditions as rows
    pub mean: PathBuf,
    /// CSV with the rate standard deviations, conditions as rows
    pub sd: PathBuf,
    /// `id,name` CSV of reaction names; the SBML names when absent
    pub reaction_names: Option<PathBuf>,
    /// `id,name` CSV of metabolite names
    pub metabolite_names: Option<PathBuf>,
    /// Central metabolism table with an `ID` column
    pub central: Option<PathBuf>,
    /// How rates become bounds in `simulate`
    #[serde(default)]
    pub mode: BoundMode,
    /// Rounds per condition in `sample`
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Seed of the random number generator
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fraction of the optimum kept by pFBA when an objective is set
    #[serde(default = "default_fraction")]
    pub fraction_of_optimum: f64,
    /// Reaction whose flux is reported as growth; the SBML objective when absent
    pub growth_reaction: Option<String>,
    /// Open every transporter in both directions before simulating
    #[serde(default)]
    pub relax_transports: bool,
    /// Extra reaction id to rate name entries, on top of the default map
    #[serde(default)]
    pub rates: BTreeMap<String, String>,
    /// Do not use the default rate map, only `rates`
    #[serde(default)]
    pub replace_rates: bool,
    /// Directory for tables and figures
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Figures to draw after sampling
    #[serde(default)]
    pub plots: Vec<PlotConfig>,
}

impl RunConfig {
    /// Read a TOML file. Relative paths are taken relative to the file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config: RunConfig = std::fs::read_to_string(path)?.parse()?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.model);
        join(&mut self.mean);
        join(&mut self.sd);
        join(&mut self.output);
        for path in [
            &mut self.reaction_names,
            &mut self.metabolite_names,
            &mut self.central,
        ]
        .into_iter()
        .flatten()
        {
            join(path);
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if !(0. ..=1.).contains(&self.fraction_of_optimum) {
            return Err(ConfigError::Invalid {
                msg: format!(
                    "fraction_of_optimum must be within [0, 1], got {}",
                    self.fraction_of_optimum
                ),
            });
        }
        Ok(self)
    }

    /// Reaction to rate mapping described by this configuration.
    pub fn rate_map(&self) -> RateMap {
        let mut map = if self.replace_rates {
            RateMap::empty()
        } else {
            RateMap::default()
        };
        for (reaction, rate) in self.rates.iter() {
            map.insert(reaction, rate);
        }
        map
    }
}

impl std::str::FromStr for RunConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()
    }
}
