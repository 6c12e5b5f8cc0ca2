//! Command-line application

pub mod cli;
pub mod options;
pub mod run;
pub mod settings;
