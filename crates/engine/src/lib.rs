//! The splitting core: share allocation and debt settlement.
//!
//! Both entry points are pure, synchronous functions: they hold no state,
//! perform no I/O and are fully deterministic for a given input. Persistence
//! and formatting live in the surrounding crates and treat the results as
//! opaque numeric payloads.
//!
//! - [`allocate`] turns a total and a participant set into a per-participant
//!   owed-amount vector.
//! - [`settle`] turns owed amounts and recorded payments into directed
//!   transfers that zero every balance.

pub use currency::{Currency, scale_total};
pub use error::EngineError;
pub use rounding::Rounding;
pub use settlement::{Transfer, settle};
pub use split::{Allocation, allocate, tip_amount};

mod currency;
mod error;
mod rounding;
mod settlement;
mod split;
