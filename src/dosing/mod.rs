use std::fmt;
use std::str::FromStr;

use crate::config::{ValidatedConfig, DEFAULT_PULSE_INTERVAL, DEFAULT_PULSE_WIDTH, DEFAULT_X_LOW};
use crate::error::{PKError, PKResult};

/// Dosing regimens selectable by the `dose_mode` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoseMode {
    Normal,
    Pulse,
    Zero,
}

impl FromStr for DoseMode {
    type Err = PKError;

    fn from_str(key: &str) -> PKResult<Self> {
        match key {
            "normal" => Ok(DoseMode::Normal),
            "pulse" => Ok(DoseMode::Pulse),
            "zero" => Ok(DoseMode::Zero),
            other => Err(PKError::UnknownDoseKey(other.to_string())),
        }
    }
}

impl fmt::Display for DoseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            DoseMode::Normal => "normal",
            DoseMode::Pulse => "pulse",
            DoseMode::Zero => "zero",
        };
        f.write_str(key)
    }
}

/// Constant dose `x` at every time point.
pub fn unit_dose(_t: f64, x: f64) -> f64 {
    x
}

/// Alternates `x_high` for `pulse_width` and `x_low` for `interval`.
pub fn pulse_series_dose(t: f64, x_high: f64, x_low: f64, pulse_width: f64, interval: f64) -> f64 {
    if t.rem_euclid(pulse_width + interval) < pulse_width {
        x_high
    } else {
        x_low
    }
}

pub fn zero_dose(_t: f64, _x: f64) -> f64 {
    0.0
}

/// A dose regimen resolved once at model construction.
///
/// Evaluation is pure: the integrator may sample any `t`, repeated or out of
/// order, and always gets the same answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoseFn {
    Normal { x: f64 },
    Pulse { x_high: f64, x_low: f64, pulse_width: f64, interval: f64 },
    Zero,
}

impl DoseFn {
    pub fn at(&self, t: f64) -> f64 {
        match *self {
            DoseFn::Normal { x } => unit_dose(t, x),
            DoseFn::Pulse { x_high, x_low, pulse_width, interval } => {
                pulse_series_dose(t, x_high, x_low, pulse_width, interval)
            },
            DoseFn::Zero => zero_dose(t, 0.0),
        }
    }

    pub fn mode(&self) -> DoseMode {
        match self {
            DoseFn::Normal { .. } => DoseMode::Normal,
            DoseFn::Pulse { .. } => DoseMode::Pulse,
            DoseFn::Zero => DoseMode::Zero,
        }
    }
}

/// Pulse timing used when the key resolves to [`DoseMode::Pulse`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseSettings {
    pub x_low: f64,
    pub pulse_width: f64,
    pub interval: f64,
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            x_low: DEFAULT_X_LOW,
            pulse_width: DEFAULT_PULSE_WIDTH,
            interval: DEFAULT_PULSE_INTERVAL,
        }
    }
}

impl PulseSettings {
    pub fn from_config(config: &ValidatedConfig) -> Self {
        let defaults = Self::default();
        Self {
            x_low: config.x_low.unwrap_or(defaults.x_low),
            pulse_width: config.pulse_width.unwrap_or(defaults.pulse_width),
            interval: config.pulse_interval.unwrap_or(defaults.interval),
        }
    }
}

/// Resolve a regimen key into a dose function for amount `x`.
pub fn resolve(key: &str, x: f64, pulse: PulseSettings) -> PKResult<DoseFn> {
    let dose = match key.parse::<DoseMode>()? {
        DoseMode::Normal => DoseFn::Normal { x },
        DoseMode::Pulse => DoseFn::Pulse {
            x_high: x,
            x_low: pulse.x_low,
            pulse_width: pulse.pulse_width,
            interval: pulse.interval,
        },
        DoseMode::Zero => DoseFn::Zero,
    };
    Ok(dose)
}
