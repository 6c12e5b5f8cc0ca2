//! Object storage clients

pub mod s3;
