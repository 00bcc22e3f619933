use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Unknown {kind} status: {value}")]
    InvalidStatus { kind: &'static str, value: String },

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Weak password: {0}")]
    WeakPassword(String),
}

pub type Result<T> = std::result::Result<T, Error>;
