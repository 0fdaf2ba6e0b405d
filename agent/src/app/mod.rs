//! Command-line application: argument model, options and command execution

pub mod cli;
pub mod options;
pub mod run;
