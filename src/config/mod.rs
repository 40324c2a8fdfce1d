//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)            target list / CLI flags
//!     → loader.rs (parse)           → targets.rs (parse)
//!            \                         /
//!             → merged SweepConfig ←──
//!     → validation.rs (semantic checks)
//!     → passed by value into the sweep
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a sweep starts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod targets;
pub mod validation;

pub use loader::{read_config, ConfigError};
pub use schema::{
    BuildConfig, LogFormat, OrchestratorConfig, OrchestratorKind, ProbeConfig, SweepConfig,
    TargetConfig,
};
pub use targets::ServiceTarget;
pub use validation::validate_config;
