use thiserror::Error;

/// Common error type that can hold any corkboard error
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Collaborator not registered: {0}")]
    NotRegistered(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl From<String> for CommonError {
    fn from(s: String) -> Self {
        CommonError::Generic(s)
    }
}

impl From<&str> for CommonError {
    fn from(s: &str) -> Self {
        CommonError::Generic(s.to_string())
    }
}
