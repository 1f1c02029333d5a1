//! Error taxonomy shared by every layer of the Operator.
//!
//! A typed key-value engine has many distinct failure shapes (type
//! mismatches, index bounds, divide-by-zero, ...) that a bare `io::Error`
//! can't express, so they get a dedicated enum instead.

use std::fmt;
use std::io;

/// The full error taxonomy for the Operator (spec.md §7).
#[derive(Debug)]
pub enum OperatorError {
    NotFound,
    AlreadyExists,
    TypeMismatch,
    IndexOutOfRange,
    ListEmpty,
    FieldNotFound,
    InvalidArgument(String),
    DivideByZero,
    Io(io::Error),
    TtlExpired,
    OperationNotPermitted,
    LockHeld,
}

pub type Result<T> = std::result::Result<T, OperatorError>;

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::NotFound => write!(f, "key not found"),
            OperatorError::AlreadyExists => write!(f, "key already exists"),
            OperatorError::TypeMismatch => write!(f, "stored value has a different type"),
            OperatorError::IndexOutOfRange => write!(f, "index out of range"),
            OperatorError::ListEmpty => write!(f, "list is empty"),
            OperatorError::FieldNotFound => write!(f, "field not found"),
            OperatorError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            OperatorError::DivideByZero => write!(f, "division by zero"),
            OperatorError::Io(err) => write!(f, "io error: {err}"),
            OperatorError::TtlExpired => write!(f, "key has expired"),
            OperatorError::OperationNotPermitted => {
                write!(f, "operation not permitted on this node")
            }
            OperatorError::LockHeld => write!(f, "lock is already held"),
        }
    }
}

impl std::error::Error for OperatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OperatorError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for OperatorError {
    fn from(err: io::Error) -> Self {
        OperatorError::Io(err)
    }
}

impl OperatorError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        OperatorError::InvalidArgument(msg.into())
    }
}
