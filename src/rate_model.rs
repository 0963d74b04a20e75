//! A metabolic network constrained by measured exchange rates.
use good_lp::{ResolutionError, Solver, SolverModel};
use log::{debug, info, warn};
use rand::Rng;

use crate::flux_analysis::{pfba, slim_optimize, FluxError, FluxSolution};
use crate::model::{ModelError, ModelLp};
use crate::names::NameTable;
use crate::rates::{BoundMode, ConditionRates, RateMap};

/// Results accumulated over the rounds of a sampling run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SamplingState {
    /// Number of rounds whose bounds admitted a solution
    pub n_feasible: usize,
    /// pFBA solution of every feasible round
    pub fluxes: Vec<FluxSolution>,
    /// Growth rate of every feasible round
    pub growth_rates: Vec<f64>,
}

impl SamplingState {
    /// Flux of one reaction across the feasible rounds.
    pub fn reaction_fluxes(&self, id: &str) -> Result<Vec<f64>, FluxError> {
        self.fluxes.iter().map(|solution| solution.flux(id)).collect()
    }
}

/// Wraps a [`ModelLp`] to set its bounds from experimental rates.
///
/// On construction the objective is cleared (simulations only check that the
/// measured rates are feasible and then minimise the total flux) and every
/// bound is reset to the defaults. The SBML objective is kept as the growth
/// reaction whose flux is reported as growth rate.
#[derive(Clone, Debug)]
pub struct RateModel {
    model: ModelLp,
    rate_map: RateMap,
    growth_reaction: Option<String>,
    fraction_of_optimum: f64,
}

impl RateModel {
    /// Wrap a model with the default rate map.
    pub fn new(mut model: ModelLp) -> Self {
        let growth_reaction = model.objective.take();
        model.reset_bounds();
        RateModel {
            model,
            rate_map: RateMap::default(),
            growth_reaction,
            fraction_of_optimum: 1.,
        }
    }

    /// Replace the reaction to rate mapping
    pub fn with_rate_map(mut self, rate_map: RateMap) -> Self {
        self.rate_map = rate_map;
        self
    }

    /// Fraction of the optimum enforced during pFBA when an objective is set
    pub fn with_fraction_of_optimum(mut self, fraction: f64) -> Self {
        self.fraction_of_optimum = fraction;
        self
    }

    /// Report the flux of this reaction as growth rate.
    pub fn set_growth_reaction(&mut self, id: &str) -> Result<(), ModelError> {
        self.growth_reaction = Some(self.model.reaction(id)?.id.to_owned());
        Ok(())
    }

    /// Underlying model
    pub fn model(&self) -> &ModelLp {
        &self.model
    }

    /// Underlying model, to change the objective or anything not wrapped here
    pub fn model_mut(&mut self) -> &mut ModelLp {
        &mut self.model
    }

    /// Current reaction to rate mapping
    pub fn rate_map(&self) -> &RateMap {
        &self.rate_map
    }

    /// Reaction reported as growth
    pub fn growth_reaction(&self) -> Option<&str> {
        self.growth_reaction.as_deref()
    }

    /// Set reaction lower bound
    pub fn set_lower_bound(&mut self, id: &str, bound: f64) -> Result<(), ModelError> {
        self.model.set_lower_bound(id, bound)
    }

    /// Set reaction upper bound
    pub fn set_upper_bound(&mut self, id: &str, bound: f64) -> Result<(), ModelError> {
        self.model.set_upper_bound(id, bound)
    }

    /// Set lower and upper bound of reaction
    pub fn set_bounds(&mut self, id: &str, lb: f64, ub: f64) -> Result<(), ModelError> {
        self.model.set_bounds(id, lb, ub)
    }

    /// See [`ModelLp::reset_bounds`]
    pub fn reset_bounds(&mut self) {
        self.model.reset_bounds()
    }

    /// See [`ModelLp::identify_exchanges`]
    pub fn identify_exchanges(&self) -> Vec<String> {
        self.model.identify_exchanges()
    }

    /// See [`ModelLp::identify_transports`]
    pub fn identify_transports(&self, names: &NameTable) -> Result<Vec<String>, ModelError> {
        self.model.identify_transports(names)
    }

    /// See [`ModelLp::make_transporters_reversible`]
    pub fn make_transporters_reversible(&mut self, names: &NameTable) -> Result<(), ModelError> {
        self.model.make_transporters_reversible(names)
    }

    /// See [`ModelLp::describe_reaction`]
    pub fn describe_reaction(&self, id: &str, names: &NameTable) -> Result<String, ModelError> {
        self.model.describe_reaction(id, names)
    }

    /// Constrain every mapped reaction whose rate was measured (mean and SD)
    /// in this condition. Unmeasured rates leave their reaction untouched.
    ///
    /// Either every measured rate is applied or, on error, none is.
    pub fn set_rates<R: Rng>(
        &mut self,
        rates: &ConditionRates,
        mode: BoundMode,
        rng: &mut R,
    ) -> Result<(), ModelError> {
        let mut windows = Vec::with_capacity(self.rate_map.len());
        for (rxn_id, rate) in self.rate_map.iter() {
            let (mean, sd) = match rates.get(rate) {
                Some(measured) => measured,
                None => continue,
            };
            let id = self.model.reaction(rxn_id)?.id.to_owned();
            if !(mean.is_finite() && sd.is_finite()) {
                return Err(ModelError::InvalidBounds {
                    id,
                    lb: mean - sd,
                    ub: mean + sd,
                });
            }
            let (lb, ub) = mode.bounds(mean, sd, rng);
            if lb > ub {
                return Err(ModelError::InvalidBounds { id, lb, ub });
            }
            windows.push((id, lb, ub));
        }
        for (id, lb, ub) in windows.iter() {
            self.model.set_bounds(id, *lb, *ub)?;
        }
        debug!("{} rates applied with mode {}", windows.len(), mode);
        Ok(())
    }

    fn growth_rate(&self, solution: &FluxSolution) -> Result<f64, FluxError> {
        match self.growth_reaction.as_ref() {
            Some(id) => solution.flux(id),
            None => solution
                .fluxes
                .values()
                .next()
                .copied()
                .ok_or(FluxError::UnknownFlux {
                    id: String::from("<first reaction>"),
                }),
        }
    }

    /// pFBA under the current bounds, `None` if they admit no solution.
    pub fn simulate<S>(&self, solver: S) -> Result<Option<FluxSolution>, FluxError>
    where
        S: Solver + Clone,
        S::Model: SolverModel<Error = ResolutionError>,
    {
        if slim_optimize(&self.model, solver.clone())?.is_none() {
            return Ok(None);
        }
        pfba(&self.model, solver, self.fraction_of_optimum).map(Some)
    }

    /// Check feasibility and, if feasible, run pFBA and record its fluxes and
    /// growth rate in `state`.
    pub fn run_pfba_sampled<S>(
        &self,
        state: &mut SamplingState,
        solver: S,
    ) -> Result<(), FluxError>
    where
        S: Solver + Clone,
        S::Model: SolverModel<Error = ResolutionError>,
    {
        if let Some(solution) = self.simulate(solver)? {
            state.n_feasible += 1;
            state.growth_rates.push(self.growth_rate(&solution)?);
            state.fluxes.push(solution);
        }
        Ok(())
    }

    /// `n_samples` rounds of sampled rate bounds followed by pFBA.
    pub fn sample_condition<S, R>(
        &mut self,
        rates: &ConditionRates,
        n_samples: usize,
        rng: &mut R,
        solver: S,
    ) -> Result<SamplingState, FluxError>
    where
        S: Solver + Clone,
        S::Model: SolverModel<Error = ResolutionError>,
        R: Rng,
    {
        let mut state = SamplingState::default();
        for _ in 0..n_samples {
            self.set_rates(rates, BoundMode::Sampled, rng)?;
            self.run_pfba_sampled(&mut state, solver.clone())?;
        }
        if state.n_feasible == 0 {
            warn!("none of the {} sampled bound sets was feasible", n_samples);
        } else {
            info!("{}/{} sampled bound sets feasible", state.n_feasible, n_samples);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{tests::toy_model, DEFAULT_BOUND};
    use good_lp::default_solver;
    use rand::{rngs::StdRng, SeedableRng};

    fn rate_model() -> RateModel {
        let mut map = RateMap::empty();
        map.insert("EX_a_e", "q_A");
        RateModel::new(toy_model()).with_rate_map(map)
    }

    fn rates(mean: f64, sd: f64) -> ConditionRates {
        let mut rates = ConditionRates::default();
        rates.mean.insert("q_A".to_owned(), mean);
        rates.sd.insert("q_A".to_owned(), sd);
        rates
    }

    #[test]
    fn construction_clears_objective_and_resets_bounds() {
        let model = rate_model();
        assert_eq!(model.model().objective, None);
        assert_eq!(model.growth_reaction(), Some("R_BIOMASS"));
        let exchange = model.model().reaction("EX_a_e").unwrap();
        assert_eq!((exchange.lb, exchange.ub), (-DEFAULT_BOUND, DEFAULT_BOUND));
        assert_eq!(RateModel::new(toy_model()).rate_map().len(), 21);
    }

    #[test]
    fn mean_rates_fix_the_exchange() {
        let mut model = rate_model();
        let mut rng = StdRng::seed_from_u64(42);
        model.set_rates(&rates(-4., 1.), BoundMode::Mean, &mut rng).unwrap();
        let exchange = model.model().reaction("EX_a_e").unwrap();
        assert_eq!((exchange.lb, exchange.ub), (-4., -4.));
        model.set_rates(&rates(-4., 1.), BoundMode::MeanSd, &mut rng).unwrap();
        let exchange = model.model().reaction("EX_a_e").unwrap();
        assert_eq!((exchange.lb, exchange.ub), (-5., -3.));
    }

    #[test]
    fn unmeasured_rates_are_skipped() {
        let mut model = rate_model();
        let mut rng = StdRng::seed_from_u64(42);
        model
            .set_rates(&ConditionRates::default(), BoundMode::Mean, &mut rng)
            .unwrap();
        assert_eq!(model.model().reaction("EX_a_e").unwrap().lb, -DEFAULT_BOUND);
    }

    #[test]
    fn unknown_mapped_reaction_is_an_error() {
        let mut map = RateMap::empty();
        map.insert("EX_b_e", "q_A");
        let mut model = RateModel::new(toy_model()).with_rate_map(map);
        let mut rng = StdRng::seed_from_u64(42);
        assert!(matches!(
            model.set_rates(&rates(-4., 1.), BoundMode::Mean, &mut rng),
            Err(ModelError::UnknownReaction { .. })
        ));
    }

    #[test]
    fn negative_sd_spans_the_same_window() {
        let mut model = rate_model();
        let mut rng = StdRng::seed_from_u64(42);
        model.set_rates(&rates(-4., -0.5), BoundMode::MeanSd, &mut rng).unwrap();
        let exchange = model.model().reaction("EX_a_e").unwrap();
        assert_eq!((exchange.lb, exchange.ub), (-4.5, -3.5));
    }

    #[test]
    fn failed_rates_leave_bounds_untouched() {
        let mut map = RateMap::empty();
        map.insert("EX_a_e", "q_A");
        map.insert("R1", "q_B");
        let mut model = RateModel::new(toy_model()).with_rate_map(map);
        let mut rng = StdRng::seed_from_u64(42);
        let mut measured = rates(-4., 0.5);
        measured.mean.insert("q_B".to_owned(), f64::NAN);
        measured.sd.insert("q_B".to_owned(), 0.5);
        assert!(matches!(
            model.set_rates(&measured, BoundMode::Sampled, &mut rng),
            Err(ModelError::InvalidBounds { id, .. }) if id == "R_R1"
        ));
        let exchange = model.model().reaction("EX_a_e").unwrap();
        assert_eq!((exchange.lb, exchange.ub), (-DEFAULT_BOUND, DEFAULT_BOUND));

        // an unmapped reaction later in the map fails before anything is set
        let mut map = RateMap::empty();
        map.insert("EX_a_e", "q_A");
        map.insert("EX_b_e", "q_A");
        let mut model = model.with_rate_map(map);
        assert!(matches!(
            model.set_rates(&rates(-4., 0.5), BoundMode::MeanSd, &mut rng),
            Err(ModelError::UnknownReaction { .. })
        ));
        let exchange = model.model().reaction("EX_a_e").unwrap();
        assert_eq!((exchange.lb, exchange.ub), (-DEFAULT_BOUND, DEFAULT_BOUND));
    }

    #[test]
    fn infeasible_rounds_are_not_recorded() {
        let mut model = rate_model();
        let mut rng = StdRng::seed_from_u64(42);
        // secretion of the substrate with nothing to make it from
        model.set_rates(&rates(4., 0.), BoundMode::Mean, &mut rng).unwrap();
        let mut state = SamplingState::default();
        model.run_pfba_sampled(&mut state, default_solver).unwrap();
        assert_eq!(state, SamplingState::default());
    }

    #[test]
    fn sampling_records_growth() {
        let mut model = rate_model();
        let mut rng = StdRng::seed_from_u64(42);
        let state = model
            .sample_condition(&rates(-4., 0.5), 20, &mut rng, default_solver)
            .unwrap();
        assert_eq!(state.n_feasible, 20);
        assert_eq!(state.fluxes.len(), 20);
        for (growth, solution) in state.growth_rates.iter().zip(state.fluxes.iter()) {
            let uptake = -solution.flux("EX_a_e").unwrap();
            assert!((3. - 1e-6..=5. + 1e-6).contains(&uptake));
            assert!((growth - uptake / 2.).abs() < 1e-6);
        }
        assert_eq!(state.reaction_fluxes("R1").unwrap().len(), 20);
    }
}
