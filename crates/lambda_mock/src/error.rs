use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("function not found: {function_name}")]
    FunctionNotFound { function_name: String },

    #[error("function {function_name} dropped its context without completing")]
    Abandoned { function_name: String },

    /// The error the invoked function settled with, unchanged.
    #[error(transparent)]
    Function(anyhow::Error),
}

impl InvocationError {
    pub fn function_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Function(error) => Some(error),
            _ => None,
        }
    }
}
