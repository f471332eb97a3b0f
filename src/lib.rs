//! Multi-compartment pharmacokinetic models.
//!
//! A configuration mapping is defaulted, validated and turned into an
//! intravenous or subcutaneous [`models::CompartmentModel`] with any number
//! of peripheral compartments. [`simulation::Simulator`] integrates the
//! model's linear ODE system into a [`simulation::Solution`].

pub mod config;
pub mod dosing;
pub mod error;
pub mod models;
pub mod output;
pub mod simulation;

pub use config::{validate, with_defaults, Configuration, ValidatedConfig};
pub use error::{PKError, PKResult};
pub use models::{create_model, CompartmentModel};
pub use simulation::{solve, Simulator, Solution, SolverOptions};
