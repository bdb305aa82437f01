//! Subcommand implementations, one module per [`crate::Commands`] arm.

pub mod demo;
pub mod sample_client;
pub mod serve;
