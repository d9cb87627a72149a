//! Readiness check for the OAuth discovery document served by every API server replica.

#![allow(clippy::result_large_err)]

pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod readiness;
pub mod resources;
pub mod status;
pub mod telemetry;
pub mod transport;

pub use config::WellKnownConfig;
pub use error::{Error, Result};
pub use readiness::{TickReport, Verdict, WellKnownReadyController};
