pub mod app;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod export;
pub mod fmt;
pub mod logging;
pub mod pipeline;
pub mod portal;
pub mod schedule;
pub mod services;
pub mod session;
pub mod state;
pub mod utils;
pub mod web;
