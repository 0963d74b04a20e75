//! Metabolic network read from an SBML document, with the bound bookkeeping
//! needed to constrain it from experimental rates.
use custom_error::custom_error;
use indexmap::IndexMap;
use log::{debug, warn};
use rust_sbml::{Model, Parameter, Reaction, SpeciesReference};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::names::NameTable;

/// Magnitude of the bounds used when a reaction is considered unconstrained.
pub const DEFAULT_BOUND: f64 = 1000.;

custom_error! {
    /// Error for inconsistencies on the SBML document or on bound manipulation
    pub ModelError
    /// The document could not be parsed
    Sbml{/// parser message
        msg: String} = "could not parse SBML document: {msg}",
    /// When a reaction uses an unknown parameter
    InconsistentModel{/// parameter name
        param: String} = "reaction points to {param} but it does not exist in model.parameters",
    /// When a parameter.value is accessed but None
    EmptyParameter{/// parameter name
        param: String} = "the parameter {param} exists but it holds no value",
    /// When the model.objective is not in model.reactions
    InconsistentObjective{/// objective name
        obj: String} = "model.objective points to {obj}, which could not be found in the model.",
    /// When a reaction id is not in the model
    UnknownReaction{/// reaction id
        id: String} = "reaction {id} could not be found in the model",
    /// When a name table has no entry for a reaction
    MissingName{/// reaction id
        id: String} = "no name was provided for reaction {id}",
    /// When a lower bound would end up above the upper bound
    InvalidBounds{/// reaction id
        id: String, /// lower bound
        lb: f64, /// upper bound
        ub: f64} = "invalid bounds for {id}: lower bound {lb} is greater than upper bound {ub}"
}

/// Metabolite as declared in the SBML document.
#[derive(Clone, Debug, PartialEq)]
pub struct MetaboliteLp {
    /// Id from SBML document
    pub id: String,
    /// Name from SBML document
    pub name: Option<String>,
}

/// Reaction struct translated from a SBML Reaction for ease of use.
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionLp {
    /// Id from SBML document
    pub id: String,
    /// Name from SBML document
    pub name: Option<String>,
    /// lower bound of the reaction
    pub lb: f64,
    /// upper bound of the reaction
    pub ub: f64,
    /// consumed metabolites and their (positive) coefficients
    pub reactants: Vec<(String, f64)>,
    /// produced metabolites and their (positive) coefficients
    pub products: Vec<(String, f64)>,
}

fn resolve_bound(
    bound: Option<&String>,
    default_param: &str,
    fallback: f64,
    parameters: &HashMap<String, Parameter>,
) -> Result<f64, ModelError> {
    match bound {
        Some(s) => parameters
            .get(s)
            .ok_or(ModelError::InconsistentModel {
                param: s.to_owned(),
            })?
            .value
            .ok_or(ModelError::EmptyParameter {
                param: s.to_owned(),
            }),
        _ => match parameters.get(default_param) {
            Some(param) => param.value.ok_or(ModelError::EmptyParameter {
                param: String::from(default_param),
            }),
            _ => Ok(fallback),
        },
    }
}

fn terms(species_references: Vec<SpeciesReference>) -> Vec<(String, f64)> {
    species_references
        .into_iter()
        .map(|sref| (sref.species, sref.stoichiometry.unwrap_or(1.)))
        .collect()
}

impl ReactionLp {
    /// Reaction with no metabolites; use [`ReactionLp::reactant`] and
    /// [`ReactionLp::product`] to fill in the stoichiometry.
    pub fn new(id: &str, lb: f64, ub: f64) -> Self {
        ReactionLp {
            id: id.to_owned(),
            name: None,
            lb,
            ub,
            reactants: Vec::new(),
            products: Vec::new(),
        }
    }

    /// Set the name of the reaction
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    /// Add a consumed metabolite
    pub fn reactant(mut self, metabolite: &str, coefficient: f64) -> Self {
        self.reactants.push((metabolite.to_owned(), coefficient));
        self
    }

    /// Add a produced metabolite
    pub fn product(mut self, metabolite: &str, coefficient: f64) -> Self {
        self.products.push((metabolite.to_owned(), coefficient));
        self
    }

    fn from_reaction(
        reaction: Reaction,
        parameters: &HashMap<String, Parameter>,
    ) -> Result<ReactionLp, ModelError> {
        Ok(ReactionLp {
            lb: resolve_bound(
                reaction.lower_bound.as_ref(),
                "cobra_default_lb",
                -DEFAULT_BOUND,
                parameters,
            )?,
            ub: resolve_bound(
                reaction.upper_bound.as_ref(),
                "cobra_default_ub",
                DEFAULT_BOUND,
                parameters,
            )?,
            id: reaction.id,
            name: reaction.name,
            reactants: terms(reaction.list_of_reactants.species_references),
            products: terms(reaction.list_of_products.species_references),
        })
    }

    /// Whether the reaction can currently carry flux in both directions.
    pub fn is_reversible(&self) -> bool {
        self.lb < 0. && self.ub > 0.
    }

    /// Exchanges (and sinks, demands) only consume or only produce.
    pub fn is_boundary(&self) -> bool {
        self.reactants.is_empty() || self.products.is_empty()
    }

    fn arrow(&self) -> &'static str {
        if self.is_reversible() {
            "<=>"
        } else if self.lb < 0. && self.ub <= 0. {
            "<--"
        } else {
            "-->"
        }
    }

    /// Reaction equation where each metabolite is rendered by `label`.
    pub fn equation<F>(&self, label: F) -> String
    where
        F: Fn(&str) -> String,
    {
        let side = |terms: &[(String, f64)]| {
            terms
                .iter()
                .map(|(met, coeff)| {
                    if (coeff - 1.).abs() < f64::EPSILON {
                        label(met)
                    } else {
                        // `{:?}` keeps the decimal point of whole numbers: `2.0 a`
                        format!("{:?} {}", coeff, label(met))
                    }
                })
                .collect::<Vec<String>>()
                .join(" + ")
        };
        let lhs = side(&self.reactants);
        let rhs = side(&self.products);
        match (lhs.is_empty(), rhs.is_empty()) {
            (true, true) => self.arrow().to_owned(),
            (true, false) => format!("{} {}", self.arrow(), rhs),
            (false, true) => format!("{} {}", lhs, self.arrow()),
            (false, false) => format!("{} {} {}", lhs, self.arrow(), rhs),
        }
    }
}

impl fmt::Display for ReactionLp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.equation(|met| met.to_owned()))
    }
}

/// Metabolic network: the variables (reactions) and mass balances
/// (metabolites) of a Flux Balance Analysis formulation.
///
/// See: [What is flux balance analysis?, Orth et al., 2010](https://www.ncbi.nlm.nih.gov/pmc/articles/PMC3108565/)
///
/// Reactions are kept in a deterministic order (sorted by id when read from
/// SBML, insertion order otherwise), which is also the order of the fluxes in
/// every [`FluxSolution`](crate::FluxSolution).
#[derive(Clone, Debug)]
pub struct ModelLp {
    /// Id from SBML document
    pub id: String,
    /// Name from SBML document
    pub name: String,
    /// Metabolites from the SBML document
    pub metabolites: IndexMap<String, MetaboliteLp>,
    /// Reactions from the SBML document
    pub reactions: IndexMap<String, ReactionLp>,
    /// Reaction id to be maximised; `None` is a zero objective
    pub objective: Option<String>,
}

impl ModelLp {
    /// Empty network, to be filled with [`ModelLp::add_reaction`].
    pub fn new(id: &str) -> Self {
        ModelLp {
            id: id.to_owned(),
            name: String::new(),
            metabolites: IndexMap::new(),
            reactions: IndexMap::new(),
            objective: None,
        }
    }

    /// Add a reaction; metabolites not seen before are registered without name.
    pub fn add_reaction(&mut self, reaction: ReactionLp) {
        for (met, _) in reaction.reactants.iter().chain(reaction.products.iter()) {
            self.metabolites
                .entry(met.to_owned())
                .or_insert_with(|| MetaboliteLp {
                    id: met.to_owned(),
                    name: None,
                });
        }
        self.reactions.insert(reaction.id.to_owned(), reaction);
    }

    /// Set the reaction to be maximised, or clear it with `None`.
    pub fn set_objective(&mut self, objective: Option<&str>) -> Result<(), ModelError> {
        self.objective = match objective {
            Some(id) => Some(self.reaction(id)?.id.to_owned()),
            None => None,
        };
        Ok(())
    }

    /// Index of a reaction, accepting ids with or without the SBML `R_` prefix.
    fn index_of(&self, id: &str) -> Result<usize, ModelError> {
        self.reactions
            .get_index_of(id)
            .or_else(|| self.reactions.get_index_of(&format!("R_{}", id)))
            .ok_or(ModelError::UnknownReaction { id: id.to_owned() })
    }

    /// Get a reaction by id
    pub fn reaction(&self, id: &str) -> Result<&ReactionLp, ModelError> {
        let index = self.index_of(id)?;
        Ok(&self.reactions[index])
    }

    /// Get a mutable reaction by id
    pub fn reaction_mut(&mut self, id: &str) -> Result<&mut ReactionLp, ModelError> {
        let index = self.index_of(id)?;
        Ok(&mut self.reactions[index])
    }

    /// Set reaction lower bound
    pub fn set_lower_bound(&mut self, id: &str, bound: f64) -> Result<(), ModelError> {
        let ub = self.reaction(id)?.ub;
        self.set_bounds(id, bound, ub)
    }

    /// Set reaction upper bound
    pub fn set_upper_bound(&mut self, id: &str, bound: f64) -> Result<(), ModelError> {
        let lb = self.reaction(id)?.lb;
        self.set_bounds(id, lb, bound)
    }

    /// Set lower and upper bound of a reaction at once.
    pub fn set_bounds(&mut self, id: &str, lb: f64, ub: f64) -> Result<(), ModelError> {
        let reaction = self.reaction_mut(id)?;
        if lb > ub {
            return Err(ModelError::InvalidBounds {
                id: reaction.id.to_owned(),
                lb,
                ub,
            });
        }
        debug!("bounds of {} set to [{}, {}]", reaction.id, lb, ub);
        reaction.lb = lb;
        reaction.ub = ub;
        Ok(())
    }

    /// Reset all bounds to the defaults: (0, 1000) for irreversible and
    /// (-1000, 1000) for reversible reactions.
    pub fn reset_bounds(&mut self) {
        for reaction in self.reactions.values_mut() {
            reaction.lb = if reaction.is_reversible() {
                -DEFAULT_BOUND
            } else {
                0.
            };
            reaction.ub = DEFAULT_BOUND;
        }
    }

    /// Ids of the exchange reactions: those without reactants or without products.
    pub fn identify_exchanges(&self) -> Vec<String> {
        self.reactions
            .values()
            .filter(|reaction| reaction.is_boundary())
            .map(|reaction| reaction.id.to_owned())
            .collect()
    }

    /// Ids of the transport reactions, identified by their names.
    pub fn identify_transports(&self, names: &NameTable) -> Result<Vec<String>, ModelError> {
        let mut transports = Vec::new();
        for id in self.reactions.keys() {
            let name = names
                .reaction(id)
                .ok_or(ModelError::MissingName { id: id.to_owned() })?;
            if name.contains("trans_") || name.contains("transporter") {
                transports.push(id.to_owned());
            }
        }
        Ok(transports)
    }

    /// Open every transport reaction in both directions.
    pub fn make_transporters_reversible(&mut self, names: &NameTable) -> Result<(), ModelError> {
        let transports = self.identify_transports(names)?;
        if transports.is_empty() {
            warn!("no transport reaction found in {}", self.id);
        }
        for id in transports.iter() {
            self.set_bounds(id, -DEFAULT_BOUND, DEFAULT_BOUND)?;
        }
        Ok(())
    }

    /// Reaction equation with metabolite names, headed by the reaction id and
    /// name. Metabolites without a name are shown by id.
    pub fn describe_reaction(&self, id: &str, names: &NameTable) -> Result<String, ModelError> {
        let reaction = self.reaction(id)?;
        let reaction_name = names
            .reaction(&reaction.id)
            .ok_or(ModelError::MissingName {
                id: reaction.id.to_owned(),
            })?;
        let equation = reaction.equation(|met| match names.metabolite(met) {
            Some(name) => name.to_owned(),
            None => met.to_owned(),
        });
        Ok(format!("{} ({}):\n{}", reaction.id, reaction_name, equation))
    }
}

impl FromStr for ModelLp {
    type Err = ModelError;

    fn from_str(input_sbml: &str) -> Result<Self, ModelError> {
        let model =
            Model::parse(input_sbml).map_err(|e| ModelError::Sbml { msg: e.to_string() })?;
        Self::try_from(model)
    }
}

impl TryFrom<Model> for ModelLp {
    type Error = ModelError;

    fn try_from(model: Model) -> Result<ModelLp, ModelError> {
        let config = model.parameters;
        let mut reactions = IndexMap::with_capacity(model.reactions.len());
        for (key, reaction) in model.reactions.into_iter() {
            reactions.insert(key, ReactionLp::from_reaction(reaction, &config)?);
        }
        reactions.sort_keys();
        let mut metabolites: IndexMap<String, MetaboliteLp> = model
            .species
            .into_iter()
            .map(|(key, species)| {
                (
                    key,
                    MetaboliteLp {
                        id: species.id,
                        name: species.name,
                    },
                )
            })
            .collect();
        metabolites.sort_keys();
        let objective = match model.objectives.and_then(|objs| objs.into_iter().next()) {
            Some(obj) if reactions.contains_key(&obj) => Some(obj),
            Some(obj) => return Err(ModelError::InconsistentObjective { obj }),
            None => None,
        };
        debug!(
            "read model with {} reactions and {} metabolites",
            reactions.len(),
            metabolites.len()
        );

        Ok(ModelLp {
            id: model.id.unwrap_or_default(),
            name: model.name.unwrap_or_default(),
            metabolites,
            reactions,
            objective,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Substrate uptake feeding growth through a short and a long branch.
    pub(crate) fn toy_model() -> ModelLp {
        let mut model = ModelLp::new("toy");
        model.add_reaction(
            ReactionLp::new("R_EX_a_e", -10., DEFAULT_BOUND)
                .named("substrate exchange")
                .reactant("M_a_e", 1.),
        );
        model.add_reaction(
            ReactionLp::new("R_TA", 0., DEFAULT_BOUND)
                .named("substrate transporter")
                .reactant("M_a_e", 1.)
                .product("M_a_c", 1.),
        );
        model.add_reaction(
            ReactionLp::new("R_R1", 0., DEFAULT_BOUND)
                .named("short branch")
                .reactant("M_a_c", 1.)
                .product("M_b_c", 1.),
        );
        model.add_reaction(
            ReactionLp::new("R_R2", 0., DEFAULT_BOUND)
                .named("long branch, first step")
                .reactant("M_a_c", 1.)
                .product("M_c_c", 1.),
        );
        model.add_reaction(
            ReactionLp::new("R_R3", 0., DEFAULT_BOUND)
                .named("long branch, second step")
                .reactant("M_c_c", 1.)
                .product("M_b_c", 1.),
        );
        model.add_reaction(
            ReactionLp::new("R_BIOMASS", 0., DEFAULT_BOUND)
                .named("biomass")
                .reactant("M_b_c", 2.),
        );
        model.set_objective(Some("R_BIOMASS")).unwrap();
        model
    }

    #[test]
    fn lookup_accepts_unprefixed_ids() {
        let model = toy_model();
        assert_eq!(model.reaction("TA").unwrap().id, "R_TA");
        assert_eq!(model.reaction("R_TA").unwrap().id, "R_TA");
        assert!(matches!(
            model.reaction("nope"),
            Err(ModelError::UnknownReaction { .. })
        ));
    }

    #[test]
    fn set_bounds_rejects_crossed_bounds() {
        let mut model = toy_model();
        model.set_bounds("R1", -5., 5.).unwrap();
        assert_eq!(model.reaction("R1").unwrap().lb, -5.);
        assert!(matches!(
            model.set_lower_bound("R1", 6.),
            Err(ModelError::InvalidBounds { .. })
        ));
        model.set_upper_bound("R1", 2.).unwrap();
        assert_eq!(model.reaction("R1").unwrap().ub, 2.);
    }

    #[test]
    fn reset_bounds_follows_reversibility() {
        let mut model = toy_model();
        model.set_bounds("R1", 1., 3.).unwrap();
        model.reset_bounds();
        let exchange = model.reaction("EX_a_e").unwrap();
        assert_eq!((exchange.lb, exchange.ub), (-DEFAULT_BOUND, DEFAULT_BOUND));
        let r1 = model.reaction("R1").unwrap();
        assert_eq!((r1.lb, r1.ub), (0., DEFAULT_BOUND));
    }

    #[test]
    fn exchanges_lack_one_side() {
        let model = toy_model();
        assert_eq!(model.identify_exchanges(), vec!["R_EX_a_e", "R_BIOMASS"]);
    }

    #[test]
    fn transporters_become_reversible() {
        let mut model = toy_model();
        let names = NameTable::from_model(&model);
        assert_eq!(model.identify_transports(&names).unwrap(), vec!["R_TA"]);
        model.make_transporters_reversible(&names).unwrap();
        let transport = model.reaction("TA").unwrap();
        assert_eq!((transport.lb, transport.ub), (-DEFAULT_BOUND, DEFAULT_BOUND));
    }

    #[test]
    fn transports_need_every_name() {
        let model = toy_model();
        assert!(matches!(
            model.identify_transports(&NameTable::default()),
            Err(ModelError::MissingName { .. })
        ));
    }

    #[test]
    fn display_reaction() {
        let model = toy_model();
        assert_eq!(model.reaction("R1").unwrap().to_string(), "R_R1: M_a_c --> M_b_c");
        assert_eq!(
            model.reaction("EX_a_e").unwrap().to_string(),
            "R_EX_a_e: M_a_e <=>"
        );
        assert_eq!(
            model.reaction("BIOMASS").unwrap().to_string(),
            "R_BIOMASS: 2.0 M_b_c -->"
        );
    }

    #[test]
    fn stoichiometry_keeps_decimal_point() {
        let reaction = ReactionLp::new("R_X", 0., DEFAULT_BOUND)
            .reactant("a", 2.)
            .reactant("b", 1.)
            .product("c", 1.)
            .product("d", 0.5);
        assert_eq!(reaction.to_string(), "R_X: 2.0 a + b --> c + 0.5 d");
    }

    fn parameters(values: &[(&str, Option<f64>)]) -> HashMap<String, Parameter> {
        values
            .iter()
            .map(|(id, value)| {
                (
                    id.to_string(),
                    Parameter {
                        id: id.to_string(),
                        value: *value,
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn bounds_come_from_fbc_parameters() {
        let params = parameters(&[
            ("cobra_default_lb", Some(-500.)),
            ("R_X_lower", Some(-3.)),
        ]);
        let lower = "R_X_lower".to_owned();
        assert_eq!(
            resolve_bound(Some(&lower), "cobra_default_lb", -DEFAULT_BOUND, &params).unwrap(),
            -3.
        );
        assert_eq!(
            resolve_bound(None, "cobra_default_lb", -DEFAULT_BOUND, &params).unwrap(),
            -500.
        );
    }

    #[test]
    fn missing_defaults_fall_back() {
        let params = parameters(&[]);
        assert_eq!(
            resolve_bound(None, "cobra_default_lb", -DEFAULT_BOUND, &params).unwrap(),
            -DEFAULT_BOUND
        );
        assert_eq!(
            resolve_bound(None, "cobra_default_ub", DEFAULT_BOUND, &params).unwrap(),
            DEFAULT_BOUND
        );
    }

    #[test]
    fn dangling_bound_is_inconsistent() {
        let params = parameters(&[("cobra_default_ub", Some(DEFAULT_BOUND))]);
        let upper = "R_X_upper".to_owned();
        assert!(matches!(
            resolve_bound(Some(&upper), "cobra_default_ub", DEFAULT_BOUND, &params),
            Err(ModelError::InconsistentModel { param }) if param == "R_X_upper"
        ));
    }

    #[test]
    fn parameter_without_value_is_empty() {
        let params = parameters(&[("R_X_upper", None), ("cobra_default_ub", None)]);
        let upper = "R_X_upper".to_owned();
        assert!(matches!(
            resolve_bound(Some(&upper), "cobra_default_ub", DEFAULT_BOUND, &params),
            Err(ModelError::EmptyParameter { param }) if param == "R_X_upper"
        ));
        assert!(matches!(
            resolve_bound(None, "cobra_default_ub", DEFAULT_BOUND, &params),
            Err(ModelError::EmptyParameter { param }) if param == "cobra_default_ub"
        ));
    }

    #[test]
    fn dangling_objective_is_rejected() {
        let model = Model {
            objectives: Some(vec!["R_GROWTH".to_owned()]),
            ..Default::default()
        };
        assert!(matches!(
            ModelLp::try_from(model),
            Err(ModelError::InconsistentObjective { obj }) if obj == "R_GROWTH"
        ));
    }

    #[test]
    fn describe_with_names() {
        let mut model = toy_model();
        model.metabolites["M_a_c"].name = Some("glucose".to_owned());
        let names = NameTable::from_model(&model);
        assert_eq!(
            model.describe_reaction("R1", &names).unwrap(),
            "R_R1 (short branch):\nglucose --> M_b_c"
        );
    }
}
