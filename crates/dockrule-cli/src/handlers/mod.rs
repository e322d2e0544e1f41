//! Command handlers.

pub mod run;
