pub mod integrator;
pub mod solution;

use log::{debug, info, warn};
use std::time::{Duration, Instant};

use crate::error::{IntegrationError, IntegrationErrorKind, PKResult};
use crate::models::CompartmentModel;

pub use integrator::{
    Dopri5Integrator, IntegrationOutcome, IntegrationStats, IntegrationStatus, Integrator,
    OdeSystem,
};
pub use solution::{CompartmentSummary, Solution};

pub const DEFAULT_RESOLUTION: usize = 1000;
pub const DEFAULT_POINTS_PER_TIME_CONSTANT: f64 = 10.0;
pub const DEFAULT_HORIZON: f64 = 1.0;
pub const DEFAULT_MAX_POINTS: usize = 100_000;

#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Minimum number of evaluation points over the horizon.
    pub resolution: usize,
    /// Grid points required per `1 / fastest_rate` time constant.
    pub points_per_time_constant: f64,
    /// Upper bound on the densified grid. `resolution` is always honoured.
    pub max_points: usize,
    /// Overrides the configured `time` when set.
    pub horizon: Option<f64>,
    pub rtol: f64,
    pub atol: f64,
    /// Amounts below `-negative_tolerance` are reported as failures.
    pub negative_tolerance: f64,
    pub timeout: Option<Duration>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            points_per_time_constant: DEFAULT_POINTS_PER_TIME_CONSTANT,
            max_points: DEFAULT_MAX_POINTS,
            horizon: None,
            rtol: 1e-6,
            atol: 1e-9,
            negative_tolerance: 1e-9,
            timeout: None,
        }
    }
}

impl SolverOptions {
    /// Number of evaluation points needed to resolve `fastest_rate` over
    /// `horizon`, capped at `max_points`.
    pub fn eval_points(&self, horizon: f64, fastest_rate: f64) -> usize {
        let cap = self.max_points.max(self.resolution);
        let intervals = (horizon * fastest_rate * self.points_per_time_constant).ceil();
        let required = if !(intervals > 0.0) {
            0
        } else if intervals.is_finite() && intervals < cap as f64 {
            (intervals as usize).saturating_add(1).min(cap)
        } else {
            warn!(
                "Rate {:.3e} needs {:.3e} evaluation points; capped at {}",
                fastest_rate, intervals, cap
            );
            cap
        };
        if required > self.resolution {
            warn!(
                "Resolution {} too coarse for rate {:.3}; using {} points",
                self.resolution, fastest_rate, required
            );
        }
        self.resolution.max(required).max(2)
    }
}

/// Evenly spaced grid over `[0, horizon]` whose last point is exactly
/// `horizon`.
pub fn time_grid(horizon: f64, points: usize) -> Vec<f64> {
    let points = points.max(2);
    let last = (points - 1) as f64;
    (0..points)
        .map(|i| if i == points - 1 { horizon } else { horizon * i as f64 / last })
        .collect()
}

/// Binds models to an integrator and runs them.
pub struct Simulator<I: Integrator = Dopri5Integrator> {
    options: SolverOptions,
    integrator: I,
}

impl Simulator<Dopri5Integrator> {
    pub fn new(options: SolverOptions) -> Self {
        let integrator = Dopri5Integrator::new(options.rtol, options.atol);
        Self {
            options,
            integrator,
        }
    }
}

impl Default for Simulator<Dopri5Integrator> {
    fn default() -> Self {
        Self::new(SolverOptions::default())
    }
}

impl<I: Integrator> Simulator<I> {
    pub fn with_integrator(options: SolverOptions, integrator: I) -> Self {
        Self {
            options,
            integrator,
        }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn solve(&self, model: &CompartmentModel) -> PKResult<Solution> {
        let horizon = self.options.horizon.unwrap_or(model.config().time);
        let horizon = if horizon > 0.0 { horizon } else { DEFAULT_HORIZON };
        let points = self.options.eval_points(horizon, model.fastest_rate());
        let t_eval = time_grid(horizon, points);
        let y0 = vec![0.0; model.compartment_count()];

        info!(
            "Solving '{}' over [0, {}] with {} evaluation points",
            model.name(),
            horizon,
            points
        );

        let deadline = self.options.timeout.map(|timeout| Instant::now() + timeout);
        let outcome = self.integrator.integrate(model, &y0, &t_eval, deadline);

        let stats = match outcome.status {
            IntegrationStatus::Converged(stats) => stats,
            IntegrationStatus::Failed(ref reason) => {
                let (time, state) = outcome.last_point();
                return Err(IntegrationError {
                    kind: IntegrationErrorKind::NonConvergent(reason.clone()),
                    time,
                    state,
                }
                .into());
            },
            IntegrationStatus::TimedOut => {
                let (time, state) = outcome.last_point();
                return Err(IntegrationError {
                    kind: IntegrationErrorKind::Timeout,
                    time,
                    state,
                }
                .into());
            },
        };

        if outcome.states.len() != t_eval.len() {
            let (time, state) = outcome.last_point();
            return Err(IntegrationError {
                kind: IntegrationErrorKind::NonConvergent(format!(
                    "integrator returned {} of {} evaluation points",
                    outcome.states.len(),
                    t_eval.len()
                )),
                time,
                state,
            }
            .into());
        }

        self.check_non_negative(&outcome)?;
        debug!("Integration statistics: {:?}", stats);

        let solution = Solution::new(
            outcome.times,
            &outcome.states,
            model.compartment_labels(),
            model.config().configuration().clone(),
            stats,
        );
        info!("Solved '{}'", model.name());
        Ok(solution)
    }

    fn check_non_negative(&self, outcome: &IntegrationOutcome) -> PKResult<()> {
        for (&time, state) in outcome.times.iter().zip(&outcome.states) {
            if let Some((compartment, &amount)) = state
                .iter()
                .enumerate()
                .find(|(_, &q)| q < -self.options.negative_tolerance)
            {
                return Err(IntegrationError {
                    kind: IntegrationErrorKind::NegativeAmount {
                        compartment,
                        amount,
                    },
                    time,
                    state: state.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Solve `model` with default solver options.
pub fn solve(model: &CompartmentModel) -> PKResult<Solution> {
    Simulator::<Dopri5Integrator>::default().solve(model)
}
