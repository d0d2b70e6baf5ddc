pub mod error;
pub mod models;
pub mod ports;

pub use error::{ConfigError, DomainError, DomainResult, EnvironmentError, RuntimeError, TaskError};
