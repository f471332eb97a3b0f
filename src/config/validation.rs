use serde_json::{Map, Value};

use super::{periph_key, Configuration, MAX_COMPARTMENTS, MAX_TIME_HORIZON};
use crate::error::{ValidationError, ValidationErrors, ValidationKind};
use crate::models::Peripheral;

/// Configuration that passed every schema check, with typed fields.
///
/// The injection type and dose key are still plain text: their legality is
/// decided when the model is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub name: String,
    pub injection_type: String,
    pub v_c: f64,
    pub cl: f64,
    pub x: f64,
    pub dose_mode: String,
    pub nr_compartments: usize,
    pub time: f64,
    pub peripherals: Vec<Peripheral>,
    pub k_a: Option<f64>,
    pub x_low: Option<f64>,
    pub pulse_width: Option<f64>,
    pub pulse_interval: Option<f64>,
    configuration: Configuration,
}

impl ValidatedConfig {
    /// The mapping this config was validated from.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }
}

/// Lower bound accepted for a numeric field.
#[derive(Clone, Copy)]
enum Bound {
    Positive,
    NonNegative,
}

impl Bound {
    fn accepts(self, value: f64) -> bool {
        match self {
            Bound::Positive => value > 0.0,
            Bound::NonNegative => value >= 0.0,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Bound::Positive => "larger than 0",
            Bound::NonNegative => "at least 0",
        }
    }
}

/// Check `config` against the schema, collecting every failure.
///
/// Validation never mutates its input; defaults must be applied beforehand
/// with [`super::with_defaults`].
pub fn validate(config: &Configuration) -> Result<ValidatedConfig, ValidationErrors> {
    let map = match config.as_value() {
        Value::Object(map) => map,
        _ => {
            return Err(ValidationErrors(vec![ValidationError::new(
                "<root>",
                ValidationKind::InvalidShape,
                "data input should be a dictionary",
            )]));
        },
    };

    let mut checker = Checker {
        map,
        errors: Vec::new(),
    };

    let name = checker.text("name");
    let injection_type = checker.text("injection_type");
    let dose_mode = checker.text("dose_mode");
    let v_c = checker.float("V_c", Bound::Positive);
    let cl = checker.float("CL", Bound::NonNegative);
    let x = checker.float("X", Bound::NonNegative);
    let nr_compartments = checker.count("nr_compartments");
    let time = checker.time("time");

    if map.contains_key("periph_default") {
        checker.peripheral("periph_default");
    }

    // Peripheral entries can only be enumerated once the count is sound.
    let peripherals: Option<Vec<Peripheral>> = nr_compartments.map(|count| {
        (1..=count)
            .filter_map(|i| checker.peripheral(&periph_key(i)))
            .collect()
    });

    let k_a = if injection_type.as_deref() == Some("subcutaneous") {
        checker.float("k_a", Bound::Positive)
    } else {
        checker.optional_float("k_a", Bound::Positive)
    };
    let x_low = checker.optional_float("X_low", Bound::NonNegative);
    let pulse_width = checker.optional_float("pulse_width", Bound::Positive);
    let pulse_interval = checker.optional_float("pulse_interval", Bound::NonNegative);

    let (
        Some(name),
        Some(injection_type),
        Some(dose_mode),
        Some(v_c),
        Some(cl),
        Some(x),
        Some(nr_compartments),
        Some(time),
        Some(peripherals),
    ) = (
        name,
        injection_type,
        dose_mode,
        v_c,
        cl,
        x,
        nr_compartments,
        time,
        peripherals,
    )
    else {
        return Err(ValidationErrors(checker.errors));
    };
    if !checker.errors.is_empty() {
        return Err(ValidationErrors(checker.errors));
    }

    Ok(ValidatedConfig {
        name,
        injection_type,
        v_c,
        cl,
        x,
        dose_mode,
        nr_compartments,
        time,
        peripherals,
        k_a,
        x_low,
        pulse_width,
        pulse_interval,
        configuration: config.clone(),
    })
}

struct Checker<'a> {
    map: &'a Map<String, Value>,
    errors: Vec<ValidationError>,
}

impl<'a> Checker<'a> {
    fn fail(&mut self, field: &str, kind: ValidationKind, message: String) {
        self.errors.push(ValidationError::new(field, kind, message));
    }

    fn required(&mut self, field: &str) -> Option<&'a Value> {
        let value = self.map.get(field);
        if value.is_none() {
            self.fail(
                field,
                ValidationKind::MissingRequired,
                format!("{} is required", field),
            );
        }
        value
    }

    fn text(&mut self, field: &str) -> Option<String> {
        match self.required(field)? {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.fail(
                    field,
                    ValidationKind::WrongType,
                    format!("{} should be a string", field),
                );
                None
            },
        }
    }

    fn float(&mut self, field: &str, bound: Bound) -> Option<f64> {
        let value = self.required(field)?;
        self.bounded_number(field, value, bound)
    }

    fn optional_float(&mut self, field: &str, bound: Bound) -> Option<f64> {
        let value = self.map.get(field)?;
        self.bounded_number(field, value, bound)
    }

    fn bounded_number(&mut self, field: &str, value: &Value, bound: Bound) -> Option<f64> {
        let Some(number) = value.as_f64() else {
            self.fail(
                field,
                ValidationKind::WrongType,
                format!("{} should be a float", field),
            );
            return None;
        };
        if !bound.accepts(number) {
            self.fail(
                field,
                ValidationKind::OutOfRange,
                format!("{} should be {}", field, bound.describe()),
            );
            return None;
        }
        Some(number)
    }

    fn count(&mut self, field: &str) -> Option<usize> {
        let value = self.required(field)?;
        if let Some(n) = value.as_u64() {
            if n <= MAX_COMPARTMENTS {
                return Some(n as usize);
            }
            self.fail(
                field,
                ValidationKind::OutOfRange,
                format!("{} should be at most {}", field, MAX_COMPARTMENTS),
            );
        } else if value.is_i64() {
            // Only negative integers fall through as_u64.
            self.fail(
                field,
                ValidationKind::OutOfRange,
                format!("{} should be at least 0", field),
            );
        } else {
            self.fail(
                field,
                ValidationKind::WrongType,
                format!("{} should be an integer", field),
            );
        }
        None
    }

    fn time(&mut self, field: &str) -> Option<f64> {
        let value = self.required(field)?;
        let Some(time) = value.as_f64() else {
            self.fail(
                field,
                ValidationKind::WrongType,
                format!("{} should be a number", field),
            );
            return None;
        };
        if time > MAX_TIME_HORIZON {
            self.fail(
                field,
                ValidationKind::OutOfRange,
                format!("{} exceeds maximum horizon of {}", field, MAX_TIME_HORIZON),
            );
            return None;
        }
        if time <= 0.0 {
            self.fail(
                field,
                ValidationKind::OutOfRange,
                format!("{} should be larger than 0", field),
            );
            return None;
        }
        Some(time)
    }

    fn peripheral(&mut self, field: &str) -> Option<Peripheral> {
        let value = self.required(field)?;
        let pair = match value.as_array() {
            Some(items) if items.len() == 2 => items,
            _ => {
                self.fail(
                    field,
                    ValidationKind::WrongType,
                    format!("{} should be a pair of (volume, rate)", field),
                );
                return None;
            },
        };

        let (Some(volume), Some(rate)) = (pair[0].as_f64(), pair[1].as_f64()) else {
            self.fail(
                field,
                ValidationKind::WrongType,
                format!("values associated with {} should be float", field),
            );
            return None;
        };
        if volume <= 0.0 || rate <= 0.0 {
            self.fail(
                field,
                ValidationKind::OutOfRange,
                format!("values associated with {} should be larger than 0", field),
            );
            return None;
        }
        Some(Peripheral::new(volume, rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::with_defaults;
    use serde_json::json;

    fn base() -> Value {
        json!({
            "name": "model1",
            "injection_type": "intravenous",
            "V_c": 1.0,
            "CL": 1.0,
            "X": 1.0,
            "dose_mode": "normal",
            "nr_compartments": 1,
            "periph_1": [1.0, 1.0],
            "time": 1.0,
        })
    }

    fn with(field: &str, value: Value) -> Configuration {
        let mut input = base();
        input[field] = value;
        Configuration::new(input)
    }

    fn kind_of(config: &Configuration, field: &str) -> Option<ValidationKind> {
        validate(config).unwrap_err().kind_of(field)
    }

    #[test]
    fn test_valid_configuration() {
        let validated = validate(&Configuration::new(base())).unwrap();
        assert_eq!(validated.name, "model1");
        assert_eq!(validated.nr_compartments, 1);
        assert_eq!(validated.peripherals, vec![Peripheral::new(1.0, 1.0)]);
        assert_eq!(validated.k_a, None);
    }

    #[test]
    fn test_input_dict() {
        let errors = validate(&Configuration::new(json!("string"))).unwrap_err();
        assert_eq!(errors.errors().len(), 1);
        assert_eq!(errors.errors()[0].kind, ValidationKind::InvalidShape);
    }

    #[test]
    fn test_inputs_strings() {
        for field in ["name", "injection_type"] {
            let config = with(field, json!(3.0));
            assert_eq!(kind_of(&config, field), Some(ValidationKind::WrongType));
        }
    }

    #[test]
    fn test_inputs_cl_x() {
        for field in ["CL", "X"] {
            assert_eq!(
                kind_of(&with(field, json!(-1)), field),
                Some(ValidationKind::OutOfRange)
            );
            assert_eq!(
                kind_of(&with(field, json!("test")), field),
                Some(ValidationKind::WrongType)
            );
        }
        // Zero clearance and zero dose are legal.
        assert!(validate(&with("CL", json!(0))).is_ok());
        assert!(validate(&with("X", json!(0.0))).is_ok());
    }

    #[test]
    fn test_nr_compartments() {
        let field = "nr_compartments";
        assert_eq!(
            kind_of(&with(field, json!(-1)), field),
            Some(ValidationKind::OutOfRange)
        );
        assert_eq!(
            kind_of(&with(field, json!("3")), field),
            Some(ValidationKind::WrongType)
        );
        assert_eq!(
            kind_of(&with(field, json!(3.0)), field),
            Some(ValidationKind::WrongType)
        );
    }

    #[test]
    fn test_nr_compartments_upper_bound() {
        let field = "nr_compartments";
        let config = with_defaults(json!({
            "name": "huge",
            "injection_type": "intravenous",
            "nr_compartments": 1_000_000_000_000u64,
        }));
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.errors().len(), 1);
        assert_eq!(errors.kind_of(field), Some(ValidationKind::OutOfRange));

        let config = with_defaults(json!({
            "name": "largest",
            "injection_type": "intravenous",
            "nr_compartments": MAX_COMPARTMENTS,
        }));
        let validated = validate(&config).unwrap();
        assert_eq!(validated.peripherals.len(), MAX_COMPARTMENTS as usize);
    }

    #[test]
    fn test_time_horizon() {
        let errors = validate(&with("time", json!(6))).unwrap_err();
        let error = errors.for_field("time").unwrap();
        assert_eq!(error.kind, ValidationKind::OutOfRange);
        assert!(error.message.contains("exceeds maximum horizon"));

        assert_eq!(
            kind_of(&with("time", json!(-1)), "time"),
            Some(ValidationKind::OutOfRange)
        );
        assert_eq!(
            kind_of(&with("time", json!("string")), "time"),
            Some(ValidationKind::WrongType)
        );
        assert!(validate(&with("time", json!(5))).is_ok());
    }

    #[test]
    fn test_inputs_periph() {
        let field = "periph_1";
        assert_eq!(
            kind_of(&with(field, json!("test")), field),
            Some(ValidationKind::WrongType)
        );
        assert_eq!(
            kind_of(&with(field, json!(["test", "test2"])), field),
            Some(ValidationKind::WrongType)
        );
        assert_eq!(
            kind_of(&with(field, json!([-1.0, 0.0])), field),
            Some(ValidationKind::OutOfRange)
        );
        assert_eq!(
            kind_of(&with(field, json!([1.0, 2.0, 3.0])), field),
            Some(ValidationKind::WrongType)
        );
    }

    #[test]
    fn test_missing_peripheral_without_defaults() {
        let config = with("nr_compartments", json!(2));
        assert_eq!(
            kind_of(&config, "periph_2"),
            Some(ValidationKind::MissingRequired)
        );
    }

    #[test]
    fn test_missing_required_fields() {
        let errors = validate(&with_defaults(json!({}))).unwrap_err();
        assert_eq!(errors.kind_of("name"), Some(ValidationKind::MissingRequired));
        assert_eq!(
            errors.kind_of("injection_type"),
            Some(ValidationKind::MissingRequired)
        );
    }

    #[test]
    fn test_collects_all_failures() {
        let mut input = base();
        input["CL"] = json!(-2.0);
        input["time"] = json!(9);
        input["name"] = json!(1);
        let errors = validate(&Configuration::new(input)).unwrap_err();
        assert_eq!(errors.errors().len(), 3);
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "CL", "time"]);
    }

    #[test]
    fn test_subcutaneous_requires_absorption_rate() {
        let mut input = base();
        input["injection_type"] = json!("subcutaneous");
        let config = Configuration::new(input.clone());
        assert_eq!(kind_of(&config, "k_a"), Some(ValidationKind::MissingRequired));

        input["k_a"] = json!(0.0);
        let config = Configuration::new(input);
        assert_eq!(kind_of(&config, "k_a"), Some(ValidationKind::OutOfRange));
    }

    #[test]
    fn test_injection_type_value_not_checked() {
        let validated = validate(&with("injection_type", json!("random"))).unwrap();
        assert_eq!(validated.injection_type, "random");
    }

    #[test]
    fn test_validation_is_repeatable() {
        let config = with_defaults(json!({
            "name": "twice",
            "injection_type": "subcutaneous",
            "nr_compartments": 2,
        }));
        let snapshot = config.clone();

        let first = validate(&config).unwrap();
        let second = validate(&config).unwrap();
        assert_eq!(first, second);
        assert_eq!(config, snapshot);

        let again = validate(first.configuration()).unwrap();
        assert_eq!(again, first);
    }
}
