use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PKError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Unknown dose key: '{0}' (expected one of: normal, pulse, zero)")]
    UnknownDoseKey(String),

    #[error("Unsupported model type: '{0}' (expected intravenous or subcutaneous)")]
    UnsupportedModelType(String),

    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),
}

pub type PKResult<T> = Result<T, PKError>;

/// Classification of a single configuration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    InvalidShape,
    WrongType,
    OutOfRange,
    MissingRequired,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValidationKind::InvalidShape => "invalid shape",
            ValidationKind::WrongType => "wrong type",
            ValidationKind::OutOfRange => "out of range",
            ValidationKind::MissingRequired => "missing required",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub kind: ValidationKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.field, self.kind, self.message)
    }
}

/// Every failure found in one validation pass, in check order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// First failure reported for `field`, if any.
    pub fn for_field(&self, field: &str) -> Option<&ValidationError> {
        self.0.iter().find(|e| e.field == field)
    }

    pub fn kind_of(&self, field: &str) -> Option<ValidationKind> {
        self.for_field(field).map(|e| e.kind)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", joined.join("; "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationErrorKind {
    NonConvergent(String),
    NegativeAmount { compartment: usize, amount: f64 },
    Timeout,
}

/// Integration failure together with the last known state.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct IntegrationError {
    pub kind: IntegrationErrorKind,
    pub time: f64,
    pub state: Vec<f64>,
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IntegrationErrorKind::NonConvergent(reason) => {
                write!(f, "integrator did not converge at t = {}: {}", self.time, reason)
            },
            IntegrationErrorKind::NegativeAmount { compartment, amount } => write!(
                f,
                "negative amount {} in compartment {} at t = {}",
                amount, compartment, self.time
            ),
            IntegrationErrorKind::Timeout => {
                write!(f, "integration timed out at t = {}", self.time)
            },
        }
    }
}
