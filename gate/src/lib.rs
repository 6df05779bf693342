pub mod bench;
pub mod config;
pub mod error;
pub mod gate;
pub mod kube;
pub mod smoke;

// Re-exports for convenience
pub use config::Config;
pub use error::{GateError, GateResult};
pub use gate::{Outcome, ReadinessGate};
