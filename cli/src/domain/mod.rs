//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod instance;
pub mod timeouts;
pub mod token;
pub mod unit;

pub use config::{Credential, Labels, PoolConfig, PoolConfigFile, RegistrationTarget};
pub use error::{
    AgentError, BrokerError, CleanupStage, ConfigError, PoolError, RegistrationError,
    StaleStateCleanupError, SupervisorError,
};
pub use instance::RunnerInstance;
pub use timeouts::Timeouts;
pub use token::{RegistrationToken, TokenKind, TokenPair};
pub use unit::{GeneratedUnits, RestartPolicy, Signal, UnitDefinition, UnitKind};
