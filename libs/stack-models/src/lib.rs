//! Wire models for the stack orchestration service.

pub mod models;

pub use models::*;
