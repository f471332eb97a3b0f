use super::Kinetics;
use crate::config::ValidatedConfig;

/// Subcutaneous injection: dose fills an absorption depot that empties
/// into the central compartment at rate `k_a`.
///
/// State layout: `[absorption, central, periph_1, ..., periph_n]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubcutaneousModel {
    pub(super) config: ValidatedConfig,
    pub(super) kinetics: Kinetics,
    pub(super) k_a: f64,
}

impl SubcutaneousModel {
    pub const BASE_COMPARTMENTS: usize = 2;

    pub fn new(config: ValidatedConfig, kinetics: Kinetics, k_a: f64) -> Self {
        Self {
            config,
            kinetics,
            k_a,
        }
    }

    pub fn absorption_rate(&self) -> f64 {
        self.k_a
    }

    /// dq_0/dt = Dose(t) - k_a * q_0
    /// dq_c/dt = k_a * q_0 - q_c/V_c * CL - sum_i T_i
    /// dq_pi/dt = T_i
    pub fn rhs(&self, t: f64, q: &[f64], dq: &mut [f64]) {
        let q_absorption = q[0];
        let q_central = q[1];
        let absorbed = self.k_a * q_absorption;

        let (dq_base, dq_peripheral) = dq.split_at_mut(Self::BASE_COMPARTMENTS);
        let outflow = self
            .kinetics
            .distribute(q_central, &q[Self::BASE_COMPARTMENTS..], dq_peripheral);
        dq_base[0] = self.kinetics.dose.at(t) - absorbed;
        dq_base[1] = absorbed + outflow;
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{create_model, CompartmentModel};
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    #[test]
    fn test_subcutaneous_rhs() {
        let model = create_model(json!({
            "name": "sc",
            "injection_type": "subcutaneous",
            "V_c": 1.0,
            "CL": 5.0,
            "X": 6.0,
            "k_a": 2.0,
            "nr_compartments": 1,
            "periph_1": [5.0, 3.0],
        }))
        .unwrap();

        let dq = model.derivatives(0.0, &[1.5, 1.0, 2.5]);
        // absorbed = 3, T_1 = 3 * (1 - 0.5) = 1.5
        assert_abs_diff_eq!(dq[0], 6.0 - 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dq[1], 3.0 - 5.0 - 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(dq[2], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_default_absorption_rate() {
        let model = create_model(json!({
            "name": "sc",
            "injection_type": "subcutaneous",
        }))
        .unwrap();
        match model {
            CompartmentModel::Subcutaneous(ref sc) => assert_eq!(sc.absorption_rate(), 1.0),
            _ => panic!("expected subcutaneous model"),
        }
        assert_eq!(model.central_index(), 1);
    }

    #[test]
    fn test_conservation_without_clearance() {
        let model = create_model(json!({
            "name": "closed",
            "injection_type": "subcutaneous",
            "CL": 0.0,
            "k_a": 1.3,
            "dose_mode": "zero",
            "nr_compartments": 2,
            "periph_1": [2.0, 0.4],
            "periph_2": [0.5, 1.1],
        }))
        .unwrap();
        let total: f64 = model.derivatives(1.0, &[3.0, 1.0, 0.2, 0.9]).iter().sum();
        assert_abs_diff_eq!(total, 0.0, epsilon = 1e-12);
    }
}
