use thiserror::Error;

/// Rejections raised before any simulation step is computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },
}

impl SimulationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::InvalidInput { field, .. } => field,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", .0.join(", "))]
    Invalid(Vec<String>),
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
