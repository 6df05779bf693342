// Module declarations for Kubernetes abstractions
pub mod client;
pub mod mock;
pub mod traits;

// Re-exports for convenience
pub use client::KubeStatusProvider;
pub use mock::MockStatusProvider;
pub use traits::{Phase, StatusProvider, StatusReport};
