//! COBRA methods that take a [`ModelLp`] and a good_lp [`Solver`]
use custom_error::custom_error;
use good_lp::{
    constraint, variable, Constraint, Expression, ProblemVariables, ResolutionError, Solution,
    Solver, SolverModel, Variable,
};
use indexmap::IndexMap;
use log::debug;

use std::collections::HashMap;
use std::ops::Index;

use crate::model::{ModelError, ModelLp};

/// Slack on the optimum enforced in the second pFBA step.
const OPTIMUM_TOLERANCE: f64 = 1e-7;

custom_error! {
    /// Error raised while optimizing a model or reading its solution
    pub FluxError
    /// The model itself is inconsistent
    Model{/// underlying error
        source: ModelError} = "{source}",
    /// The LP solver did not find an optimum
    Solver{/// underlying error
        source: ResolutionError} = "solver failed: {source}",
    /// A flux was requested for a reaction that is not in the solution
    UnknownFlux{/// reaction id
        id: String} = "no flux for reaction {id} in the solution"
}

/// Fluxes of an optimal solution, in the reaction order of the model.
#[derive(Clone, Debug, PartialEq)]
pub struct FluxSolution {
    /// Value of the objective reaction (0 with a zero objective)
    pub objective_value: f64,
    /// Reaction id to flux
    pub fluxes: IndexMap<String, f64>,
}

impl FluxSolution {
    /// Flux of a reaction; the `R_` prefix is optional.
    pub fn get(&self, id: &str) -> Option<f64> {
        self.fluxes
            .get(id)
            .or_else(|| self.fluxes.get(&format!("R_{}", id)))
            .copied()
    }

    /// Like [`FluxSolution::get`], with a missing reaction as an error.
    pub fn flux(&self, id: &str) -> Result<f64, FluxError> {
        self.get(id)
            .ok_or(FluxError::UnknownFlux { id: id.to_owned() })
    }

    /// Iterate over (reaction id, flux)
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, f64> {
        self.fluxes.iter()
    }

    /// Sum of absolute fluxes
    pub fn total_flux(&self) -> f64 {
        self.fluxes.values().map(|v| v.abs()).sum()
    }
}

impl Index<&str> for FluxSolution {
    type Output = f64;

    fn index(&self, id: &str) -> &f64 {
        &self.fluxes[id]
    }
}

/// LP problem as a Flux Balance Analysis formulation.
///
/// Being $S$ the stoichiometry matrix and $\overrightarrow{v}$ the flux vector
/// representing the reactions in the reconstruction:
///
/// $$ S\overrightarrow{v} = 0 \newline \text{where}\medspace lb_j \le v_j \le ub_j $$
struct Formulation {
    problem: ProblemVariables,
    variables: IndexMap<String, Variable>,
    constraints: Vec<Constraint>,
}

impl Formulation {
    fn new(model: &ModelLp) -> Self {
        let mut problem = ProblemVariables::new();
        let variables: IndexMap<String, Variable> = model
            .reactions
            .iter()
            .map(|(id, reac)| {
                (
                    id.to_owned(),
                    problem.add(variable().min(reac.lb).max(reac.ub)),
                )
            })
            .collect();
        // Build a constraint (stoichiometry) table metabolites x reactions.
        let mut stoichiometry = HashMap::<&str, Vec<Expression>>::new();
        for (reac_id, reaction) in model.reactions.iter() {
            let var = variables[reac_id.as_str()];
            reaction.reactants.iter().for_each(|(met, coeff)| {
                stoichiometry
                    .entry(met.as_str())
                    .or_insert_with(Vec::new)
                    .push(var * -coeff)
            });
            reaction.products.iter().for_each(|(met, coeff)| {
                stoichiometry
                    .entry(met.as_str())
                    .or_insert_with(Vec::new)
                    .push(var * *coeff)
            });
        }
        let constraints = stoichiometry
            .into_iter()
            .map(|(_, cons)| constraint::eq(cons.into_iter().sum::<Expression>(), 0.))
            .collect();
        Formulation {
            problem,
            variables,
            constraints,
        }
    }

    fn objective(&self, model: &ModelLp) -> Result<Option<Variable>, FluxError> {
        match model.objective.as_ref() {
            Some(obj) => self
                .variables
                .get(obj)
                .copied()
                .map(Some)
                .ok_or(FluxError::Model {
                    source: ModelError::InconsistentObjective {
                        obj: obj.to_owned(),
                    },
                }),
            None => Ok(None),
        }
    }
}

/// Optimize the model according to Flux Balance Analysis (FBA).
/// FBA: [https://pubmed.ncbi.nlm.nih.gov/20212490/](https://pubmed.ncbi.nlm.nih.gov/20212490/)
///
/// A model without objective is solved as a feasibility problem.
///
/// # Example
/// ```
/// use fluxrates::{fba, ModelLp};
/// use good_lp::default_solver;
/// use std::str::FromStr;
///
/// let model = ModelLp::from_str(include_str!("../tests/data/toy.xml")).unwrap();
/// let solution = fba(&model, default_solver).unwrap();
/// assert!((solution.objective_value - 5.).abs() < 1e-6);
/// println!("{:?}", solution)
/// ```
pub fn fba<S>(model: &ModelLp, solver: S) -> Result<FluxSolution, FluxError>
where
    S: Solver,
    S::Model: SolverModel<Error = ResolutionError>,
{
    let formulation = Formulation::new(model);
    let objective_var = formulation.objective(model)?;
    let objective = match objective_var {
        Some(var) => Expression::from(var),
        None => Expression::from_other_affine(0.),
    };
    let Formulation {
        problem,
        variables,
        constraints,
    } = formulation;
    let lp = constraints
        .into_iter()
        .fold(problem.maximise(objective).using(solver), |lp, c| lp.with(c));
    let solution = lp.solve()?;
    let fluxes: IndexMap<String, f64> = variables
        .iter()
        .map(|(id, var)| (id.to_owned(), solution.value(*var)))
        .collect();
    let objective_value = objective_var.map_or(0., |var| solution.value(var));
    debug!("FBA optimum of {}: {}", model.id, objective_value);
    Ok(FluxSolution {
        objective_value,
        fluxes,
    })
}

/// Objective value of the FBA problem, `None` if it is infeasible or unbounded.
pub fn slim_optimize<S>(model: &ModelLp, solver: S) -> Result<Option<f64>, FluxError>
where
    S: Solver,
    S::Model: SolverModel<Error = ResolutionError>,
{
    match fba(model, solver) {
        Ok(solution) => Ok(Some(solution.objective_value)),
        Err(FluxError::Solver {
            source: ResolutionError::Infeasible,
        })
        | Err(FluxError::Solver {
            source: ResolutionError::Unbounded,
        }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parsimonious FBA: among the solutions that reach `fraction_of_optimum` of
/// the FBA optimum, find the one with the smallest sum of absolute fluxes.
/// With no objective, the total flux is minimised over the feasible space.
///
/// pFBA: [https://pubmed.ncbi.nlm.nih.gov/20664636/](https://pubmed.ncbi.nlm.nih.gov/20664636/)
pub fn pfba<S>(
    model: &ModelLp,
    solver: S,
    fraction_of_optimum: f64,
) -> Result<FluxSolution, FluxError>
where
    S: Solver + Clone,
    S::Model: SolverModel<Error = ResolutionError>,
{
    let mut formulation = Formulation::new(model);
    let objective_var = formulation.objective(model)?;
    let mut objective_value = 0.;
    if let Some(var) = objective_var {
        objective_value = fba(model, solver.clone())?.objective_value;
        formulation
            .constraints
            .push(constraint::geq(
                var,
                fraction_of_optimum * objective_value - OPTIMUM_TOLERANCE,
            ));
    }
    // |v_j| <= t_j
    let mut totals = Vec::with_capacity(formulation.variables.len());
    for var in formulation.variables.values() {
        let total = formulation.problem.add(variable().min(0.));
        formulation.constraints.push(constraint::geq(total - *var, 0.));
        formulation.constraints.push(constraint::geq(total + *var, 0.));
        totals.push(total);
    }
    let total_flux: Expression = totals.into_iter().map(Expression::from).sum();
    let Formulation {
        problem,
        variables,
        constraints,
    } = formulation;
    let lp = constraints
        .into_iter()
        .fold(problem.minimise(total_flux).using(solver), |lp, c| lp.with(c));
    let solution = lp.solve()?;
    let fluxes: IndexMap<String, f64> = variables
        .iter()
        .map(|(id, var)| (id.to_owned(), solution.value(*var)))
        .collect();
    if let Some(var) = objective_var {
        objective_value = solution.value(var);
    }
    Ok(FluxSolution {
        objective_value,
        fluxes,
    })
}
