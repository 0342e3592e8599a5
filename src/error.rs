use thiserror::Error;

use crate::transition::State;

/// Configuration errors raised while wiring nodes and forces together.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("missing: {0}")]
    MissingNode(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("illegal type: {0:?}")]
    IllegalType(String),
    #[error("unknown type: {0}")]
    UnknownType(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("transition not found")]
    NotFound,
    #[error("too late; transition is already {state:?}")]
    TooLate { state: State },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
