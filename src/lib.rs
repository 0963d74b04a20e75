#![deny(unsafe_code)]
#![deny(bare_trait_objects)]
#![deny(unconditional_recursion)]
#![warn(missing_docs)]
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]
#![warn(unreachable_pub)]
#![warn(unused_qualifications)]

//! Rate-constrained Flux Balance Analysis.
//!
//! Reads a metabolic reconstruction with [rust_sbml](https://docs.rs/rust_sbml),
//! constrains its exchange reactions with experimentally measured
//! uptake/secretion rates and optimizes it with [good_lp](https://docs.rs/good_lp).
//!
//! # COBRA methods available
//!
//! * [Flux Balance Analysis](https://www.ncbi.nlm.nih.gov/pmc/articles/PMC3108565/).
//! * [Parsimonious FBA](https://pubmed.ncbi.nlm.nih.gov/20664636/).
//!
//! Rates are turned into bounds from their mean, from mean ± SD, or by sampling
//! bounds within mean ± 2 SD; in the latter case pFBA is run on every feasible
//! draw and the resulting flux distributions can be compared to the
//! experiment with [`plot_sampling`].
//!
//! # Examples
//!
//! Fix the substrate uptake of a toy network to its measured mean and
//! minimise the total flux
//! ```
//! use fluxrates::{rates::Table, BoundMode, Measurements, ModelLp, RateMap, RateModel};
//! use good_lp::default_solver;
//! use rand::{rngs::StdRng, SeedableRng};
//! use std::str::FromStr;
//!
//! let model = ModelLp::from_str(include_str!("../tests/data/toy.xml")).unwrap();
//! let data = Measurements {
//!     mean: Table::from_reader("condition,q_A\nLow Cell Density,-4\n".as_bytes()).unwrap(),
//!     sd: Table::from_reader("condition,q_A\nLow Cell Density,0.5\n".as_bytes()).unwrap(),
//! };
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut rate_map = RateMap::empty();
//! rate_map.insert("EX_a_e", "q_A");
//! let mut model = RateModel::new(model).with_rate_map(rate_map);
//! let rates = data.condition("Low Cell Density").unwrap();
//! model.set_rates(&rates, BoundMode::Mean, &mut rng).unwrap();
//! let solution = model.simulate(default_solver).unwrap().unwrap();
//! for (name, val) in solution.iter() {
//!     println!("{} = {}", name, val)
//! }
//! assert!((solution["R_BIOMASS"] - 2.).abs() < 1e-6);
//! ```
//!
//! # Additional links
//!
//! * [rust_sbml](https://docs.rs/rust_sbml): SBML parser in rust.
//! * [cobrapy](https://github.com/opencobra/cobrapy/): COBRA package in Python.
pub mod central;
pub mod config;
pub mod flux_analysis;
pub mod logging;
pub mod model;
pub mod names;
pub mod plot;
pub mod rate_model;
pub mod rates;

pub use central::{get_central_fluxes, CentralMap};
pub use config::RunConfig;
pub use flux_analysis::{fba, pfba, slim_optimize, FluxError, FluxSolution};
pub use model::{ModelError, ModelLp, ReactionLp};
pub use names::NameTable;
pub use plot::plot_sampling;
pub use rate_model::{RateModel, SamplingState};
pub use rates::{BoundMode, ConditionRates, DataError, Measurements, RateMap};
