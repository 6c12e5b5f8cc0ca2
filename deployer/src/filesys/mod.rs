//! Local filesystem access

pub mod dir;
pub mod file;
