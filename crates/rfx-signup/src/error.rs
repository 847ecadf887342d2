use rfx_runtime::BindingError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SignupError>;

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("submit button is disabled; the form is not valid")]
    SubmitDisabled,
}

impl SignupError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig { .. } => 2,
            Self::SubmitDisabled => 3,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
