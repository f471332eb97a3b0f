use super::Kinetics;
use crate::config::ValidatedConfig;

/// Intravenous bolus: dose enters the central compartment directly.
///
/// State layout: `[central, periph_1, ..., periph_n]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntravenousModel {
    pub(super) config: ValidatedConfig,
    pub(super) kinetics: Kinetics,
}

impl IntravenousModel {
    pub const BASE_COMPARTMENTS: usize = 1;

    pub fn new(config: ValidatedConfig, kinetics: Kinetics) -> Self {
        Self { config, kinetics }
    }

    /// dq_c/dt = Dose(t) - q_c/V_c * CL - sum_i T_i
    /// dq_pi/dt = T_i
    pub fn rhs(&self, t: f64, q: &[f64], dq: &mut [f64]) {
        let q_central = q[0];
        let (dq_central, dq_peripheral) = dq.split_at_mut(Self::BASE_COMPARTMENTS);
        let outflow = self
            .kinetics
            .distribute(q_central, &q[Self::BASE_COMPARTMENTS..], dq_peripheral);
        dq_central[0] = self.kinetics.dose.at(t) + outflow;
    }
}
