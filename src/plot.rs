//! Sampled simulation results against the experimental measurements.
use custom_error::custom_error;
use indexmap::IndexMap;
use plotters::coord::Shift;
use plotters::prelude::*;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use std::path::Path;

use crate::rates::{DataError, Measurements};

custom_error! {
    /// Error while drawing a figure
    pub PlotError
    /// The experimental value to plot is missing
    Data{/// underlying error
        source: DataError} = "{source}",
    /// Backend failure
    Drawing{/// backend message
        msg: String} = "could not draw figure: {msg}",
    /// Jitter could not be generated
    Jitter{/// message
        msg: String} = "{msg}",
    /// Nothing was given to plot
    Empty = "no condition to plot"
}

/// Colour of the simulated fluxes (darkorchid)
pub const SIMULATION: RGBColor = RGBColor(153, 50, 204);
/// Colour of the experimental values (mediumseagreen)
pub const EXPERIMENT: RGBColor = RGBColor(60, 179, 113);

const JITTER_SD: f64 = 0.06;
const EXPERIMENT_OFFSET: f64 = 0.3;

fn drawing<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> PlotError {
    PlotError::Drawing {
        msg: err.to_string(),
    }
}

fn tick_label(ticks: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 1. {
        return String::new();
    }
    ticks
        .get(rounded as usize - 1)
        .cloned()
        .unwrap_or_default()
}

/// Top of the y range: room above the experimental mean ± 2 SD for the
/// legend, raised to fit every sampled value. Falls back to 1 when no
/// positive range exists.
fn y_top(means: &[f64], sd2: &[f64], simulated: &IndexMap<String, Vec<f64>>) -> f64 {
    let max_mean = means.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let max_sd2 = sd2.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let max_sample = simulated
        .values()
        .flatten()
        .cloned()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let top = (max_mean + max_sd2 * 1.5).max(max_sample * 1.05);
    if !top.is_finite() || top <= 0. {
        1.
    } else {
        top
    }
}

/// Boxplot of the sampled fluxes of one reaction per condition, with the
/// sampled points jittered around each box and the experimental mean ± 2 SD
/// drawn next to it.
///
/// `simulated` maps condition names (as in `measurements`) to the fluxes of
/// the reaction measured by `feature`. The figure is written as SVG to `path`.
pub fn plot_sampling<P, R>(
    path: P,
    simulated: &IndexMap<String, Vec<f64>>,
    measurements: &Measurements,
    feature: &str,
    ylabel: Option<&str>,
    rng: &mut R,
) -> Result<(), PlotError>
where
    P: AsRef<Path>,
    R: Rng,
{
    let root = SVGBackend::new(path.as_ref(), (800, 600)).into_drawing_area();
    draw_sampling(&root, simulated, measurements, feature, ylabel, rng)?;
    root.present().map_err(drawing)
}

fn draw_sampling<DB, R>(
    root: &DrawingArea<DB, Shift>,
    simulated: &IndexMap<String, Vec<f64>>,
    measurements: &Measurements,
    feature: &str,
    ylabel: Option<&str>,
    rng: &mut R,
) -> Result<(), PlotError>
where
    DB: DrawingBackend,
    R: Rng,
{
    if simulated.is_empty() {
        return Err(PlotError::Empty);
    }
    let n = simulated.len();
    let ticks: Vec<String> = simulated
        .keys()
        .map(|name| name.replace(" Cell Density", ""))
        .collect();
    let mut means = Vec::with_capacity(n);
    let mut sd2 = Vec::with_capacity(n);
    for condition in simulated.keys() {
        means.push(measurements.mean(feature, condition)?);
        sd2.push(measurements.sd(feature, condition)? * 2.);
    }
    let top = y_top(&means, &sd2, simulated);

    root.fill(&WHITE).map_err(drawing)?;
    let mut chart = ChartBuilder::on(root)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.5f64..(n as f64 + 0.5), 0f32..top as f32)
        .map_err(drawing)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| tick_label(&ticks, *x))
        .y_desc(ylabel.unwrap_or(feature))
        .draw()
        .map_err(drawing)?;

    chart
        .draw_series(simulated.values().enumerate().filter(|(_, v)| !v.is_empty()).map(
            |(i, values)| {
                Boxplot::new_vertical(i as f64 + 1., &Quartiles::new(values.as_slice()))
                    .width(40)
                    .style(BLACK)
            },
        ))
        .map_err(drawing)?;

    let mut points = Vec::new();
    for (i, values) in simulated.values().enumerate() {
        let jitter = Normal::new(1. + i as f64, JITTER_SD)
            .map_err(|e| PlotError::Jitter { msg: e.to_string() })?;
        // plotters does not clip to the y range
        points.extend(
            values
                .iter()
                .filter(|&&y| (0. ..=top).contains(&y))
                .map(|&y| (jitter.sample(rng), y as f32)),
        );
    }
    chart
        .draw_series(
            points
                .into_iter()
                .map(|point| Circle::new(point, 2, SIMULATION.mix(0.2).filled())),
        )
        .map_err(drawing)?
        .label("Simulation")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], SIMULATION.filled()));

    let xs: Vec<f64> = (0..n).map(|i| i as f64 + 1. + EXPERIMENT_OFFSET).collect();
    chart
        .draw_series(xs.iter().zip(means.iter().zip(sd2.iter())).map(|(&x, (&m, &s))| {
            ErrorBar::new_vertical(
                x,
                (m - s) as f32,
                m as f32,
                (m + s) as f32,
                EXPERIMENT.filled(),
                10,
            )
        }))
        .map_err(drawing)?;
    chart
        .draw_series(
            xs.iter()
                .zip(means.iter())
                .map(|(&x, &m)| Circle::new((x, m as f32), 5, EXPERIMENT.filled())),
        )
        .map_err(drawing)?
        .label("Experiment")
        .legend(|(x, y)| Circle::new((x + 5, y), 5, EXPERIMENT.filled()));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(drawing)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::tests::measurements;
    use rand::{rngs::StdRng, SeedableRng};

    fn simulated() -> IndexMap<String, Vec<f64>> {
        let mut simulated = IndexMap::new();
        simulated.insert("Low Cell Density".to_owned(), vec![3.8, 4.1, 4.3, 3.9]);
        simulated.insert("High Cell Density".to_owned(), vec![7.5, 8.2, 8.8]);
        simulated
    }

    #[test]
    fn ticks_only_on_boxes() {
        let ticks = vec!["Low".to_owned(), "High".to_owned()];
        assert_eq!(tick_label(&ticks, 1.), "Low");
        assert_eq!(tick_label(&ticks, 2.), "High");
        assert_eq!(tick_label(&ticks, 1.5), "");
        assert_eq!(tick_label(&ticks, 3.), "");
    }

    #[test]
    fn range_covers_every_sample() {
        let means = [4., 8.];
        let sd2 = [1., 2.];
        // experiment alone asks for 8 + 1.5 * 2
        assert_eq!(y_top(&means, &sd2, &simulated()), 11.);
        let mut outlier = simulated();
        outlier["High Cell Density"].push(20.);
        let top = y_top(&means, &sd2, &outlier);
        assert!(top >= 20.);
        assert!((top - 21.).abs() < 1e-9);
    }

    #[test]
    fn uptake_only_range_falls_back() {
        let mut uptake = IndexMap::new();
        uptake.insert("Low Cell Density".to_owned(), vec![-4.2, -3.9]);
        assert_eq!(y_top(&[-4.], &[1.], &uptake), 1.);
    }

    #[test]
    fn writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q_A.svg");
        let mut data = measurements();
        // uptake plotted as positive consumption
        for row in data.mean.rows.values_mut() {
            if let Some(v) = row.get_mut("q_A") {
                *v = -*v;
            }
        }
        let mut rng = StdRng::seed_from_u64(42);
        plot_sampling(&path, &simulated(), &data, "q_A", Some("uptake"), &mut rng).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Simulation"));
        assert!(svg.contains("uptake"));
    }

    #[test]
    fn missing_experiment_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let result = plot_sampling(
            dir.path().join("mu.svg"),
            &simulated(),
            &measurements(),
            "mu",
            None,
            &mut rng,
        );
        assert!(matches!(result, Err(PlotError::Data { .. })));
    }

    #[test]
    fn nothing_to_plot() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let result = plot_sampling(
            dir.path().join("empty.svg"),
            &IndexMap::new(),
            &measurements(),
            "q_A",
            None,
            &mut rng,
        );
        assert!(matches!(result, Err(PlotError::Empty)));
    }
}
