//! Transaction engine domain module
//!
//! Contains the models, the pure lifecycle rules, and the service advancing
//! escrow-mediated sales and trades.

pub mod lifecycle;
mod model;
mod service;

pub use model::*;
pub use service::TransactionService;
