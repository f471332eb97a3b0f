pub mod intravenous;
pub mod subcutaneous;

use log::info;
use serde_json::Value;

use crate::config::{validate, with_defaults, ValidatedConfig};
use crate::dosing::{self, DoseFn, PulseSettings};
use crate::error::{PKError, PKResult, ValidationError, ValidationErrors, ValidationKind};

pub use intravenous::IntravenousModel;
pub use subcutaneous::SubcutaneousModel;

/// Volume and inter-compartmental rate of one peripheral compartment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peripheral {
    pub volume: f64,
    pub rate: f64,
}

impl Peripheral {
    pub fn new(volume: f64, rate: f64) -> Self {
        Self { volume, rate }
    }
}

/// Flux from the central compartment into one peripheral compartment.
///
/// `Q_p * (q_c / V_c - q_p / V_p)`; the same value leaves the central
/// compartment and enters the peripheral one.
pub fn transition(v_c: f64, peripheral: &Peripheral, q_central: f64, q_peripheral: f64) -> f64 {
    peripheral.rate * (q_central / v_c - q_peripheral / peripheral.volume)
}

/// Parameters shared by every injection topology.
#[derive(Debug, Clone, PartialEq)]
pub struct Kinetics {
    pub v_c: f64,
    pub cl: f64,
    pub peripherals: Vec<Peripheral>,
    pub dose: DoseFn,
}

impl Kinetics {
    fn from_config(config: &ValidatedConfig) -> PKResult<Self> {
        let dose = dosing::resolve(&config.dose_mode, config.x, PulseSettings::from_config(config))?;
        Ok(Self {
            v_c: config.v_c,
            cl: config.cl,
            peripherals: config.peripherals.clone(),
            dose,
        })
    }

    /// Central and peripheral derivatives for a central amount read once
    /// at call entry.
    ///
    /// Writes each peripheral inflow into `dq_peripheral` and returns the
    /// central derivative without its input term.
    fn distribute(&self, q_central: f64, q_peripheral: &[f64], dq_peripheral: &mut [f64]) -> f64 {
        let mut sum_of_transitions = 0.0;
        for ((peripheral, &q_p), dq_p) in self
            .peripherals
            .iter()
            .zip(q_peripheral)
            .zip(dq_peripheral.iter_mut())
        {
            let flux = transition(self.v_c, peripheral, q_central, q_p);
            *dq_p = flux;
            sum_of_transitions += flux;
        }
        -q_central / self.v_c * self.cl - sum_of_transitions
    }

    /// Fastest first-order rate present in the central/peripheral system.
    fn fastest_rate(&self) -> f64 {
        self.peripherals
            .iter()
            .flat_map(|p| [p.rate / self.v_c, p.rate / p.volume])
            .fold(self.cl / self.v_c, f64::max)
    }
}

/// A compartment model ready to be integrated.
#[derive(Debug, Clone, PartialEq)]
pub enum CompartmentModel {
    Intravenous(IntravenousModel),
    Subcutaneous(SubcutaneousModel),
}

impl CompartmentModel {
    /// Build the topology named by `injection_type`.
    pub fn from_config(config: ValidatedConfig) -> PKResult<Self> {
        let kinetics = Kinetics::from_config(&config)?;
        let model = match config.injection_type.as_str() {
            "intravenous" => CompartmentModel::Intravenous(IntravenousModel::new(config, kinetics)),
            "subcutaneous" => {
                let k_a = config.k_a.ok_or_else(|| {
                    PKError::Validation(ValidationErrors(vec![ValidationError::new(
                        "k_a",
                        ValidationKind::MissingRequired,
                        "k_a is required for subcutaneous models",
                    )]))
                })?;
                CompartmentModel::Subcutaneous(SubcutaneousModel::new(config, kinetics, k_a))
            },
            other => return Err(PKError::UnsupportedModelType(other.to_string())),
        };
        Ok(model)
    }

    pub fn config(&self) -> &ValidatedConfig {
        match self {
            CompartmentModel::Intravenous(m) => &m.config,
            CompartmentModel::Subcutaneous(m) => &m.config,
        }
    }

    pub fn kinetics(&self) -> &Kinetics {
        match self {
            CompartmentModel::Intravenous(m) => &m.kinetics,
            CompartmentModel::Subcutaneous(m) => &m.kinetics,
        }
    }

    pub fn name(&self) -> &str {
        &self.config().name
    }

    pub fn base_compartments(&self) -> usize {
        match self {
            CompartmentModel::Intravenous(_) => IntravenousModel::BASE_COMPARTMENTS,
            CompartmentModel::Subcutaneous(_) => SubcutaneousModel::BASE_COMPARTMENTS,
        }
    }

    pub fn nr_compartments(&self) -> usize {
        self.kinetics().peripherals.len()
    }

    pub fn compartment_count(&self) -> usize {
        self.base_compartments() + self.nr_compartments()
    }

    /// Index of the central compartment in the state vector.
    pub fn central_index(&self) -> usize {
        self.base_compartments() - 1
    }

    pub fn compartment_labels(&self) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.compartment_count());
        if let CompartmentModel::Subcutaneous(_) = self {
            labels.push("absorption".to_string());
        }
        labels.push("central".to_string());
        labels.extend((1..=self.nr_compartments()).map(crate::config::periph_key));
        labels
    }

    /// Fastest first-order rate of the model, used to size the time grid.
    pub fn fastest_rate(&self) -> f64 {
        match self {
            CompartmentModel::Intravenous(m) => m.kinetics.fastest_rate(),
            CompartmentModel::Subcutaneous(m) => m.kinetics.fastest_rate().max(m.k_a),
        }
    }

    /// Evaluate `dq/dt` at `(t, q)` into `dq`; both slices have
    /// `compartment_count()` entries.
    pub fn rhs(&self, t: f64, q: &[f64], dq: &mut [f64]) {
        match self {
            CompartmentModel::Intravenous(m) => m.rhs(t, q, dq),
            CompartmentModel::Subcutaneous(m) => m.rhs(t, q, dq),
        }
    }

    /// Allocating variant of [`Self::rhs`].
    pub fn derivatives(&self, t: f64, q: &[f64]) -> Vec<f64> {
        let mut dq = vec![0.0; q.len()];
        self.rhs(t, q, &mut dq);
        dq
    }
}

/// Default, validate and build a model from a raw configuration mapping.
pub fn create_model(input: Value) -> PKResult<CompartmentModel> {
    let config = with_defaults(input);
    let validated = validate(&config)?;
    let model = CompartmentModel::from_config(validated)?;
    info!(
        "Built {} model '{}' with {} compartments and {} dosing",
        model.config().injection_type,
        model.name(),
        model.compartment_count(),
        model.kinetics().dose.mode()
    );
    Ok(model)
}
