use clap::{ArgAction, Parser, Subcommand};
use fluxrates::{
    get_central_fluxes, logging, plot_sampling, BoundMode, CentralMap, FluxSolution, Measurements,
    ModelLp, NameTable, RateModel, RunConfig, SamplingState,
};
use good_lp::default_solver;
use indexmap::IndexMap;
use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "fluxrates", version, about = "Rate-constrained FBA and pFBA sampling")]
struct Cli {
    /// log4rs YAML configuration; logs to stderr when absent
    #[arg(long, global = true)]
    log_config: Option<PathBuf>,
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// pFBA for every condition, bounds set from the measured rates
    Simulate {
        /// Run configuration (TOML)
        config: PathBuf,
        /// Override the bound mode of the configuration
        #[arg(long)]
        mode: Option<BoundMode>,
    },
    /// Sample rate bounds within mean ± 2 SD and run pFBA on every draw
    Sample {
        /// Run configuration (TOML)
        config: PathBuf,
        /// Override the number of rounds per condition
        #[arg(long)]
        samples: Option<usize>,
    },
    /// Print a reaction with metabolite names
    Describe {
        /// SBML model
        model: PathBuf,
        /// Reaction id, with or without the R_ prefix
        reaction: String,
        /// `id,name` CSV of reaction names
        #[arg(long)]
        reaction_names: Option<PathBuf>,
        /// `id,name` CSV of metabolite names
        #[arg(long)]
        metabolite_names: Option<PathBuf>,
    },
    /// List the exchange reactions of a model
    Exchanges {
        /// SBML model
        model: PathBuf,
    },
}

fn read_model(path: &Path) -> Result<ModelLp, Box<dyn Error>> {
    let model = ModelLp::from_str(&fs::read_to_string(path)?)?;
    info!(
        "{}: {} reactions, {} metabolites",
        path.display(),
        model.reactions.len(),
        model.metabolites.len()
    );
    Ok(model)
}

fn read_names(
    model: &ModelLp,
    reactions: Option<&PathBuf>,
    metabolites: Option<&PathBuf>,
) -> Result<NameTable, Box<dyn Error>> {
    Ok(match reactions {
        Some(path) => NameTable::from_csv(path, metabolites)?,
        None => NameTable::from_model(model),
    })
}

/// Model with the bounds shared by every condition of the run.
fn prepare(config: &RunConfig) -> Result<RateModel, Box<dyn Error>> {
    let model = read_model(&config.model)?;
    let names = read_names(
        &model,
        config.reaction_names.as_ref(),
        config.metabolite_names.as_ref(),
    )?;
    let mut model = RateModel::new(model)
        .with_rate_map(config.rate_map())
        .with_fraction_of_optimum(config.fraction_of_optimum);
    if let Some(growth) = config.growth_reaction.as_ref() {
        model.set_growth_reaction(growth)?;
    }
    if model.growth_reaction().is_none() {
        warn!("no growth reaction; the first flux is reported as growth rate");
    }
    if config.relax_transports {
        model.make_transporters_reversible(&names)?;
    }
    Ok(model)
}

fn write_fluxes(
    path: &Path,
    model: &ModelLp,
    solutions: &IndexMap<String, FluxSolution>,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(std::iter::once("reaction").chain(solutions.keys().map(String::as_str)))?;
    for id in model.reactions.keys() {
        let mut record = vec![id.to_owned()];
        record.extend(
            solutions
                .values()
                .map(|s| s.get(id).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_central(
    path: &Path,
    central: &CentralMap,
    solutions: &IndexMap<String, FluxSolution>,
) -> Result<(), Box<dyn Error>> {
    let mut columns = Vec::with_capacity(solutions.len());
    for solution in solutions.values() {
        columns.push(get_central_fluxes(central, solution)?);
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(std::iter::once("reaction").chain(solutions.keys().map(String::as_str)))?;
    for (row, label) in central.labels().enumerate() {
        let mut record = vec![label.to_owned()];
        record.extend(columns.iter().map(|column| column[row].to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_growth(
    path: &Path,
    states: &IndexMap<String, SamplingState>,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["condition", "sample", "growth_rate"])?;
    for (condition, state) in states.iter() {
        for (i, growth) in state.growth_rates.iter().enumerate() {
            wtr.write_record([condition.to_owned(), i.to_string(), growth.to_string()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn simulate(config: RunConfig, mode: Option<BoundMode>) -> Result<(), Box<dyn Error>> {
    let base = prepare(&config)?;
    let data = Measurements::from_paths(&config.mean, &config.sd)?;
    let mode = mode.unwrap_or(config.mode);
    let mut rng = StdRng::seed_from_u64(config.seed);
    fs::create_dir_all(&config.output)?;

    let mut solutions = IndexMap::new();
    for condition in data.conditions() {
        let mut model = base.clone();
        model.set_rates(&data.condition(condition)?, mode, &mut rng)?;
        match model.simulate(default_solver)? {
            Some(solution) => {
                info!("{}: total flux {:.3}", condition, solution.total_flux());
                solutions.insert(condition.to_owned(), solution);
            }
            None => warn!("{}: rates are infeasible with mode {}", condition, mode),
        }
    }
    write_fluxes(&config.output.join("fluxes.csv"), base.model(), &solutions)?;
    if let Some(path) = config.central.as_ref() {
        let central = CentralMap::from_path(path)?;
        write_central(&config.output.join("central_fluxes.csv"), &central, &solutions)?;
    }
    Ok(())
}

fn sample(config: RunConfig, samples: Option<usize>) -> Result<(), Box<dyn Error>> {
    let base = prepare(&config)?;
    let data = Measurements::from_paths(&config.mean, &config.sd)?;
    let samples = samples.unwrap_or(config.samples);
    let mut rng = StdRng::seed_from_u64(config.seed);
    fs::create_dir_all(&config.output)?;

    let mut states = IndexMap::new();
    for condition in data.conditions() {
        info!("{}: sampling {} bound sets", condition, samples);
        let mut model = base.clone();
        let state = model.sample_condition(
            &data.condition(condition)?,
            samples,
            &mut rng,
            default_solver,
        )?;
        states.insert(condition.to_owned(), state);
    }
    write_growth(&config.output.join("growth_rates.csv"), &states)?;
    for plot in config.plots.iter() {
        let mut simulated = IndexMap::with_capacity(states.len());
        for (condition, state) in states.iter() {
            simulated.insert(condition.to_owned(), state.reaction_fluxes(&plot.reaction)?);
        }
        let path = config.output.join(format!("{}.svg", plot.feature));
        plot_sampling(
            &path,
            &simulated,
            &data,
            &plot.feature,
            plot.ylabel.as_deref(),
            &mut rng,
        )?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init(
        cli.log_config.as_deref(),
        logging::level_from_verbosity(cli.verbose),
    )?;

    match cli.command {
        Command::Simulate { config, mode } => simulate(RunConfig::from_path(config)?, mode),
        Command::Sample { config, samples } => sample(RunConfig::from_path(config)?, samples),
        Command::Describe {
            model,
            reaction,
            reaction_names,
            metabolite_names,
        } => {
            let model = read_model(&model)?;
            let names = read_names(&model, reaction_names.as_ref(), metabolite_names.as_ref())?;
            println!("{}", model.describe_reaction(&reaction, &names)?);
            Ok(())
        }
        Command::Exchanges { model } => {
            let model = read_model(&model)?;
            for id in model.identify_exchanges() {
                println!("{}", model.reaction(&id)?);
            }
            Ok(())
        }
    }
}
