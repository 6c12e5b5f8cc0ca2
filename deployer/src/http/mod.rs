//! HTTP access to the stack orchestration service

pub mod client;
pub mod stacks;

pub use client::HttpClient;
