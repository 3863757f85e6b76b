//! Common utilities shared by the runner, the probe and the scenarios

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
