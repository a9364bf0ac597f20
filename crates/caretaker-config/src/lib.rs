//! # Caretaker Config
//!
//! Configuration management for the Caretaker supervisor: a TOML file with
//! `${VAR}` substitution, overlaid with `CARETAKER_*` environment overrides.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::{ConfigLoader, ENV_OVERRIDES};
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
