use thiserror::Error;

pub type GateResult<T> = Result<T, GateError>;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Kubernetes error: {0}")]
    Kubernetes(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<kube::Error> for GateError {
    fn from(err: kube::Error) -> Self {
        GateError::Kubernetes(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = GateError::InvalidConfig("max wait below poll interval".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: max wait below poll interval"
        );
    }

    #[test]
    fn test_kubernetes_display() {
        let err = GateError::Kubernetes("connection refused".to_string());
        assert!(err.to_string().contains("Kubernetes error"));
    }

    #[test]
    fn test_internal_display() {
        let err = GateError::Internal("unexpected state".to_string());
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }
}
