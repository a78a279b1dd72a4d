//! Error taxonomy shared by every module of the crate.

use thiserror::Error;

use crate::backend::{BackendArgs, BackendId};

/// Errors raised by farm construction, curve evaluation and wake dispatch.
#[derive(Error, Debug)]
pub enum FarmError {
    /// Malformed or misaligned farm geometry.
    #[error("Layout error: {0}")]
    Layout(String),

    /// Interpolation requested outside a defined or invertible domain.
    #[error("Domain error: {0}")]
    Domain(String),

    /// Derived physical quantity outside its valid range.
    #[error("Physical range error: {0}")]
    PhysicalRange(String),

    /// Invalid dispatcher settings or state.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Wrapped failure of an external wake backend.
    #[error("Backend {backend} failed with the following inputs: {args}, and the error message: {message}")]
    BackendExecution {
        /// Backend that failed
        backend: BackendId,
        /// Arguments it was invoked with
        args: BackendArgs,
        /// Backend error text
        message: String,
    },

    /// File access failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON input.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV table read or column extraction failure.
    #[error("Table error: {0}")]
    Table(#[from] polars::prelude::PolarsError),
}

/// Result alias used throughout the crate.
pub type FarmResult<T> = Result<T, FarmError>;
