//! stackdeploy library
//!
//! Resolves a template bundle, versions it by content, validates and
//! uploads it, then creates or updates a stack and waits for it to
//! converge.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod storage;
