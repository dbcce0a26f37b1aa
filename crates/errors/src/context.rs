//! Progress context tree errors

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContextError {
    #[error("unknown context id {id}")]
    Unknown { id: usize },

    #[error("context {name} was already entered")]
    AlreadyEntered { name: String },

    #[error("context {name} exited before it was entered")]
    NotEntered { name: String },

    #[error("context {name} already exited")]
    AlreadyExited { name: String },
}
