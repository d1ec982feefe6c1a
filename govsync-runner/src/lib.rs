//! Support code for the `govsync-runner` command.

pub mod options;
pub mod records;
