//! HTTP surface over the pipeline.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod schedule;
pub mod session;
pub mod status;

pub use routes::*;
