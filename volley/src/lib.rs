#![doc = include_str!("../README.md")]

pub mod cli;
mod config;
pub mod constants;
mod error;
mod reporter;
mod run;
pub mod stats;
mod timing;
pub mod transport;
mod worker;

pub use config::RunConfig;
pub use error::{ConfigError, TransportError, VolleyError};
pub use run::{run, shutdown_signal, stress, RunSummary};
pub use stats::{Aggregator, Dispatch, StatsLine, StatusClass};
pub use transport::{Attempt, ReqwestTransport, RequestTemplate, Transport};
