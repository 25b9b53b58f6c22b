//! Errors the splitting core can throw.
//!
//! [`allocate`] and [`settle`] are total functions and never fail; these
//! variants only surface when re-hydrating string codes persisted by the
//! storage layer.
//!
//! [`allocate`]: crate::allocate
//! [`settle`]: crate::settle

use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EngineError {
    #[error("unsupported rounding mode: {0}")]
    UnsupportedRounding(String),
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}
