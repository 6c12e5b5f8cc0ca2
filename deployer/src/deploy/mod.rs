//! Deployment module

pub mod bundle;
pub mod events;
pub mod executor;
pub mod fsm;
pub mod request;
pub mod service;
pub mod upload;
