use log::debug;
use nalgebra::DVector;
use ode_solvers::Dopri5;
use std::time::Instant;

/// Right-hand side `dy/dt = f(t, y)` of an ODE system.
pub trait OdeSystem {
    fn dimension(&self) -> usize;

    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]);
}

impl OdeSystem for crate::models::CompartmentModel {
    fn dimension(&self) -> usize {
        self.compartment_count()
    }

    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
        crate::models::CompartmentModel::rhs(self, t, y, dydt)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrationStats {
    pub evaluations: usize,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationStatus {
    Converged(IntegrationStats),
    Failed(String),
    TimedOut,
}

/// Trajectory produced by an integrator.
///
/// On failure `times`/`states` hold every evaluation point reached before
/// the integrator stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationOutcome {
    pub times: Vec<f64>,
    pub states: Vec<Vec<f64>>,
    pub status: IntegrationStatus,
}

impl IntegrationOutcome {
    pub fn last_point(&self) -> (f64, Vec<f64>) {
        match (self.times.last(), self.states.last()) {
            (Some(&t), Some(state)) => (t, state.clone()),
            _ => (f64::NAN, Vec::new()),
        }
    }
}

/// Numerical integrator capability: solve `system` from `y0` and report
/// the state at every point of `t_eval`.
///
/// `t_eval` is increasing; its first and last entries are the time span.
pub trait Integrator {
    fn integrate(
        &self,
        system: &dyn OdeSystem,
        y0: &[f64],
        t_eval: &[f64],
        deadline: Option<Instant>,
    ) -> IntegrationOutcome;
}

/// Cap on accepted plus rejected steps, summed over all segments.
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

// Dense output is requested just short of each segment end, so the
// accumulated `x + dx` cursor of the stepper never overshoots it.
const SEGMENT_FRACTION: f64 = 1.0 - 1e-10;

/// Adapts an [`OdeSystem`] to the state type `ode_solvers` integrates.
struct Rhs<'a> {
    system: &'a dyn OdeSystem,
}

impl ode_solvers::System<f64, DVector<f64>> for Rhs<'_> {
    fn system(&self, t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        self.system.rhs(t, y.as_slice(), dy.as_mut_slice());
    }
}

/// Adaptive Dormand-Prince 5(4) integrator backed by `ode_solvers::Dopri5`.
///
/// Every `[t_eval[i], t_eval[i + 1]]` segment is a separate solve started
/// from the previous segment's end state, so the trajectory is reported on
/// the evaluation grid itself.
#[derive(Debug, Clone)]
pub struct Dopri5Integrator {
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
}

impl Default for Dopri5Integrator {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl Dopri5Integrator {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            ..Self::default()
        }
    }

    /// Integrate one segment and return the state at its end.
    fn segment(
        &self,
        rhs: Rhs<'_>,
        t0: f64,
        t1: f64,
        y: DVector<f64>,
        stats: &mut IntegrationStats,
    ) -> Result<DVector<f64>, String> {
        let span = t1 - t0;
        if !(span > 0.0) {
            return Err(format!("evaluation points not increasing at t = {}", t0));
        }

        let mut stepper = Dopri5::new(rhs, t0, t1, span * SEGMENT_FRACTION, y, self.rtol, self.atol);
        let segment_stats = stepper.integrate().map_err(|e| e.to_string())?;
        stats.evaluations += segment_stats.num_eval as usize;
        stats.accepted_steps += segment_stats.accepted_steps as usize;
        stats.rejected_steps += segment_stats.rejected_steps as usize;

        match (stepper.x_out().last(), stepper.y_out().last()) {
            (Some(&x), Some(state)) if (t1 - x).abs() <= span * 1e-6 => Ok(state.clone()),
            (x, _) => Err(format!(
                "no dense output at t = {} (last output at {:?})",
                t1, x
            )),
        }
    }
}

impl Integrator for Dopri5Integrator {
    fn integrate(
        &self,
        system: &dyn OdeSystem,
        y0: &[f64],
        t_eval: &[f64],
        deadline: Option<Instant>,
    ) -> IntegrationOutcome {
        let n = system.dimension();
        let mut times = Vec::with_capacity(t_eval.len());
        let mut states = Vec::with_capacity(t_eval.len());
        let mut stats = IntegrationStats::default();

        let Some(&t_start) = t_eval.first() else {
            return IntegrationOutcome {
                times,
                states,
                status: IntegrationStatus::Converged(stats),
            };
        };
        if y0.len() != n {
            return IntegrationOutcome {
                times,
                states,
                status: IntegrationStatus::Failed(format!(
                    "initial state has {} entries, system expects {}",
                    y0.len(),
                    n
                )),
            };
        }

        let mut y = DVector::from_column_slice(y0);
        times.push(t_start);
        states.push(y0.to_vec());

        for window in t_eval.windows(2) {
            let (t0, t1) = (window[0], window[1]);
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return IntegrationOutcome {
                    times,
                    states,
                    status: IntegrationStatus::TimedOut,
                };
            }

            y = match self.segment(Rhs { system }, t0, t1, y, &mut stats) {
                Ok(y) => y,
                Err(reason) => {
                    return IntegrationOutcome {
                        times,
                        states,
                        status: IntegrationStatus::Failed(reason),
                    }
                },
            };
            if stats.accepted_steps + stats.rejected_steps > self.max_steps {
                return IntegrationOutcome {
                    times,
                    states,
                    status: IntegrationStatus::Failed(format!(
                        "maximum number of steps ({}) reached",
                        self.max_steps
                    )),
                };
            }

            times.push(t1);
            states.push(y.as_slice().to_vec());
        }

        debug!(
            "Dopri5 finished: {} evaluations, {} accepted, {} rejected",
            stats.evaluations, stats.accepted_steps, stats.rejected_steps
        );
        IntegrationOutcome {
            times,
            states,
            status: IntegrationStatus::Converged(stats),
        }
    }
}
